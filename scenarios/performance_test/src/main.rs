use std::time::Duration;

use loadline_runner::prelude::*;

const FAILED_REQUESTS: &str = "failed_requests";

fn credentials_body() -> &'static str {
    r#"{"username":"{{username}}","password":"{{password}}"}"#
}

/// Register a fresh user, log in as that user and use the returned token on a protected route.
fn workflow() -> Workflow {
    let pause = Duration::from_secs(1);

    Workflow::new("auth_flow")
        .with_generator("username", ValueGenerator::random("perfuser_"))
        .with_variable("password", "test123")
        .with_failure_counter(FAILED_REQUESTS)
        .with_step(
            WorkflowStep::post("register", "{{base_url}}/register")
                .with_json_body(credentials_body())
                .with_check(Check::status("register status is 200", 200))
                .with_check(Check::latency_below(
                    "register response time < 200ms",
                    Duration::from_millis(200),
                ))
                .with_think_time(pause),
        )
        .with_step(
            WorkflowStep::post("login", "{{base_url}}/login")
                .with_json_body(credentials_body())
                .with_check(Check::status("login status is 200", 200))
                .with_check(Check::latency_below(
                    "login response time < 300ms",
                    Duration::from_millis(300),
                ))
                .with_check(Check::body_field_present("login returns token", "token"))
                .capture("token", "token")
                .with_think_time(pause),
        )
        .with_step(
            WorkflowStep::get("protected", "{{base_url}}/protected")
                .with_header("Authorization", "{{token}}")
                .with_check(Check::status("protected route status is 200", 200))
                .with_check(Check::latency_below(
                    "protected response time < 400ms",
                    Duration::from_millis(400),
                ))
                .with_think_time(pause),
        )
}

fn main() -> LoadlineResult<()> {
    let builder = ScenarioDefinitionBuilder::new_with_init(env!("CARGO_PKG_NAME"))
        .with_default_target_url("http://localhost:5000")
        .with_default_vus(50)
        .with_default_duration(Duration::from_secs(120))
        .use_workflow(workflow())
        .with_threshold(HTTP_REQ_DURATION, "p(95)<500")
        .with_threshold(FAILED_REQUESTS, "count<100");

    let result = run(builder)?;
    if !result.passed {
        std::process::exit(1);
    }

    Ok(())
}
