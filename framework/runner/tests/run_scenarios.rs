use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use loadline_runner::prelude::{
    run, Check, ConfigError, HttpClient, HttpRequest, HttpResponse, LoadlineScenarioCli,
    ReporterOpt, RequestError, RunController, ScenarioDefinitionBuilder, Stage,
    ValueGenerator, Workflow, WorkflowStep, CHECKS_FAILED, HTTP_REQS, ITERATIONS, VUS,
};

/// An in-process stand-in for the service under test.
///
/// Register and protected always succeed, login returns a token unless `tokenless_logins` says
/// otherwise. Every request is remembered with the time it was sent and the vu that sent it.
struct FakeAuthService {
    started: Instant,
    logins: AtomicUsize,
    tokenless_logins: usize,
    latency: Duration,
    requests: Mutex<Vec<(Duration, HttpRequest)>>,
}

impl FakeAuthService {
    fn new(latency: Duration) -> Self {
        Self {
            started: Instant::now(),
            logins: AtomicUsize::new(0),
            tokenless_logins: 0,
            latency,
            requests: Mutex::new(Vec::new()),
        }
    }

    fn with_tokenless_logins(mut self, count: usize) -> Self {
        self.tokenless_logins = count;
        self
    }

    fn requests(&self) -> Vec<(Duration, HttpRequest)> {
        self.requests.lock().unwrap().clone()
    }

    /// Distinct virtual users that sent a request within the window.
    fn vus_between(&self, from: Duration, to: Duration) -> usize {
        self.requests()
            .into_iter()
            .filter(|(at, _)| *at >= from && *at < to)
            .filter_map(|(_, request)| request.header("X-Vu").map(str::to_string))
            .collect::<HashSet<_>>()
            .len()
    }
}

#[async_trait::async_trait]
impl HttpClient for FakeAuthService {
    async fn send(
        &self,
        request: HttpRequest,
        _timeout: Duration,
    ) -> Result<HttpResponse, RequestError> {
        let at = self.started.elapsed();
        tokio::time::sleep(self.latency).await;

        let body = if request.url.ends_with("/login") {
            let n = self.logins.fetch_add(1, Ordering::SeqCst);
            if n < self.tokenless_logins {
                "{}".to_string()
            } else {
                format!(r#"{{"token":"token-{n}"}}"#)
            }
        } else {
            "{}".to_string()
        };

        self.requests.lock().unwrap().push((at, request));
        Ok(HttpResponse::new(200, self.latency, body))
    }
}

fn sample_cli_cfg() -> LoadlineScenarioCli {
    LoadlineScenarioCli {
        target_url: Some("http://localhost:5000".to_string()),
        vus: None,
        duration: None,
        stage: vec![],
        graceful_stop: None,
        no_progress: true,
        reporter: ReporterOpt::Noop,
        run_id: None,
    }
}

fn auth_workflow(think_time: Duration) -> Workflow {
    Workflow::new("auth")
        .with_generator("username", ValueGenerator::random("perfuser_"))
        .with_variable("password", "test123")
        .with_failure_counter("failed_requests")
        .with_step(
            WorkflowStep::post("register", "{{base_url}}/register")
                .with_header("X-Vu", "{{vu}}")
                .with_json_body(r#"{"username":"{{username}}","password":"{{password}}"}"#)
                .with_check(Check::status("register status is 200", 200))
                .with_think_time(think_time),
        )
        .with_step(
            WorkflowStep::post("login", "{{base_url}}/login")
                .with_header("X-Vu", "{{vu}}")
                .with_json_body(r#"{"username":"{{username}}","password":"{{password}}"}"#)
                .with_check(Check::status("login status is 200", 200))
                .with_check(Check::body_field_present("login returns token", "token"))
                .capture("token", "token")
                .with_think_time(think_time),
        )
        .with_step(
            WorkflowStep::get("protected", "{{base_url}}/protected")
                .with_header("X-Vu", "{{vu}}")
                .with_header("Authorization", "{{token}}")
                .with_check(Check::status("protected route status is 200", 200))
                .with_think_time(think_time),
        )
}

#[test]
fn constant_load_all_passing() {
    let service = Arc::new(FakeAuthService::new(Duration::from_millis(5)));

    let mut cfg = sample_cli_cfg();
    cfg.vus = Some(10);
    cfg.duration = Some(Duration::from_secs(5));
    let scenario = ScenarioDefinitionBuilder::new("constant_load_all_passing", cfg)
        .use_workflow(auth_workflow(Duration::from_millis(100)))
        .use_client(service.clone())
        .with_threshold("http_req_duration", "p(95)<500")
        .with_threshold("failed_requests", "count<100");

    let result = run(scenario).unwrap();

    assert!(result.passed, "{result:?}");
    assert_eq!(2, result.thresholds.len());
    assert_eq!(0, result.undrained_vus);
    for step in ["register", "login", "protected"] {
        assert!(
            result.trend(step).unwrap().count >= 10,
            "step {step} ran too few times"
        );
    }
    assert_eq!(0, result.counter(CHECKS_FAILED));
    assert_eq!(0, result.counter("failed_requests"));
    assert_eq!(service.requests().len() as u64, result.counter(HTTP_REQS));
    assert!(result.trend(VUS).unwrap().max.unwrap() <= 10.0);
    assert!(result.elapsed_s >= 5.0);
    assert_eq!(5.0, result.planned_duration_s);
}

#[test]
fn missing_token_skips_protected_step() {
    let service =
        Arc::new(FakeAuthService::new(Duration::from_millis(1)).with_tokenless_logins(1));

    let mut cfg = sample_cli_cfg();
    cfg.vus = Some(1);
    cfg.duration = Some(Duration::from_secs(1));
    let scenario = ScenarioDefinitionBuilder::new("missing_token_skips_protected_step", cfg)
        .use_workflow(auth_workflow(Duration::from_millis(20)))
        .use_client(service.clone());

    let result = run(scenario).unwrap();

    let logins = result.trend("login").unwrap().count;
    let protected = result.trend("protected").unwrap().count;
    assert!(logins >= 2);
    assert_eq!(logins - 1, protected);
    assert_eq!(1, result.counter(CHECKS_FAILED));
    assert_eq!(1, result.counter("failed_requests"));
    assert_eq!(logins as u64, result.counter(ITERATIONS));
    assert!(result.passed);
}

#[test]
fn staged_ramp_rises_then_falls() {
    let service = Arc::new(FakeAuthService::new(Duration::from_millis(1)));

    let mut cfg = sample_cli_cfg();
    cfg.stage = vec![
        Stage::new(Duration::from_secs(1), 10),
        Stage::new(Duration::from_secs(1), 0),
    ];
    let scenario = ScenarioDefinitionBuilder::new("staged_ramp_rises_then_falls", cfg)
        .use_workflow(auth_workflow(Duration::from_millis(20)))
        .use_client(service.clone())
        .with_control_interval(Duration::from_millis(50));

    let result = run(scenario).unwrap();

    let vus = result.trend(VUS).unwrap();
    assert!(vus.max.unwrap() <= 10.0);
    assert!(vus.max.unwrap() >= 8.0);
    assert!(vus.count >= 20);
    assert_eq!(0, result.undrained_vus);

    let early = service.vus_between(Duration::from_millis(100), Duration::from_millis(300));
    let peak = service.vus_between(Duration::from_millis(900), Duration::from_millis(1100));
    let late = service.vus_between(Duration::from_millis(1850), Duration::from_millis(2000));
    assert!(early < peak, "early {early}, peak {peak}");
    assert!(late < peak, "late {late}, peak {peak}");
}

#[test]
fn unknown_threshold_metric_fails_before_start() {
    let service = Arc::new(FakeAuthService::new(Duration::from_millis(1)));

    let mut cfg = sample_cli_cfg();
    cfg.vus = Some(5);
    cfg.duration = Some(Duration::from_secs(5));
    let scenario = ScenarioDefinitionBuilder::new("unknown_threshold_metric", cfg)
        .use_workflow(auth_workflow(Duration::ZERO))
        .use_client(service.clone())
        .with_threshold("errors", "count<500");

    let err = RunController::new(scenario).err().unwrap();

    assert_eq!(
        Some(&ConfigError::UnknownMetric {
            metric: "errors".to_string()
        }),
        err.downcast_ref::<ConfigError>()
    );
    assert!(service.requests().is_empty());
}

#[test]
fn external_stop_ends_the_run_early() {
    let service = Arc::new(FakeAuthService::new(Duration::from_millis(1)));

    let mut cfg = sample_cli_cfg();
    cfg.vus = Some(3);
    cfg.duration = Some(Duration::from_secs(60));
    let scenario = ScenarioDefinitionBuilder::new("external_stop_ends_the_run_early", cfg)
        // Long think time that a stop has to cut short
        .use_workflow(auth_workflow(Duration::from_secs(10)))
        .use_client(service.clone());

    let controller = RunController::new(scenario).unwrap();
    let stop_handle = controller.stop_handle();
    std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(500));
        stop_handle.stop();
    });

    let started = Instant::now();
    let result = controller.run().unwrap();

    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(0, result.undrained_vus);
    assert_eq!(3, result.counter(ITERATIONS));
    assert!(result.elapsed_s < 60.0);
}

#[test]
fn stuck_virtual_users_are_counted_as_undrained() {
    struct Stuck;

    #[async_trait::async_trait]
    impl HttpClient for Stuck {
        async fn send(
            &self,
            _request: HttpRequest,
            _timeout: Duration,
        ) -> Result<HttpResponse, RequestError> {
            tokio::time::sleep(Duration::from_secs(3)).await;
            Ok(HttpResponse::new(200, Duration::from_secs(3), "{}"))
        }
    }

    let mut cfg = sample_cli_cfg();
    cfg.vus = Some(2);
    cfg.duration = Some(Duration::from_millis(300));
    cfg.graceful_stop = Some(Duration::from_millis(200));
    let scenario = ScenarioDefinitionBuilder::new("stuck_virtual_users", cfg)
        .use_workflow(
            Workflow::new("stuck").with_step(WorkflowStep::get("slow", "{{base_url}}/slow")),
        )
        .use_client(Arc::new(Stuck))
        .with_threshold("slow", "p(95)<500");

    let started = Instant::now();
    let result = run(scenario).unwrap();

    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(2, result.undrained_vus);
    assert_eq!(0, result.counter(ITERATIONS));
    // No samples, so the percentile threshold passes vacuously
    assert!(result.passed);
    assert_eq!(None, result.thresholds[0].observed);
}
