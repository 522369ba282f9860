use tabled::Tabled;

#[derive(Tabled)]
pub struct TrendRow {
    pub metric: String,
    pub count: usize,
    #[tabled(display = "float2")]
    pub avg: Option<f64>,
    #[tabled(display = "float2")]
    pub min: Option<f64>,
    #[tabled(display = "float2")]
    pub p50: Option<f64>,
    #[tabled(display = "float2")]
    pub p90: Option<f64>,
    #[tabled(display = "float2")]
    pub p95: Option<f64>,
    #[tabled(display = "float2")]
    pub p99: Option<f64>,
    #[tabled(display = "float2")]
    pub max: Option<f64>,
}

#[derive(Tabled)]
pub struct CounterRow {
    pub metric: String,
    pub value: u64,
}

#[derive(Tabled)]
pub struct ThresholdRow {
    pub metric: String,
    pub expected: String,
    #[tabled(display = "float2")]
    pub observed: Option<f64>,
    #[tabled(display = "pass_fail")]
    pub passed: bool,
}

fn float2(n: &Option<f64>) -> String {
    match n {
        Some(n) => format!("{:.2}", n),
        None => "-".to_string(),
    }
}

fn pass_fail(passed: &bool) -> String {
    if *passed { "pass" } else { "FAIL" }.to_string()
}
