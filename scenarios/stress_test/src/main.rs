use std::time::Duration;

use loadline_runner::prelude::*;

const ERRORS: &str = "errors";

/// How many registrations are sent at once to simulate concurrent database writes
const BULK_REGISTRATIONS: usize = 5;

fn workflow() -> Workflow {
    let pause = Duration::from_secs(1);

    Workflow::new("stress_flow")
        .with_generator("username", ValueGenerator::random("stressuser_"))
        .with_variable("password", "stress123")
        .with_failure_counter(ERRORS)
        .with_step(
            WorkflowStep::post("register", "{{base_url}}/register")
                .with_json_body(r#"{"username":"{{username}}","password":"{{password}}"}"#)
                .with_check(Check::status("register successful", 200))
                .with_think_time(pause),
        )
        .with_step(
            WorkflowStep::post("login", "{{base_url}}/login")
                .with_json_body(r#"{"username":"{{username}}","password":"{{password}}"}"#)
                .with_check(Check::status("login successful", 200))
                .with_check(Check::body_field_present("received token", "token"))
                .capture("token", "token")
                .with_think_time(pause),
        )
        .with_step(
            WorkflowStep::get("protected", "{{base_url}}/protected")
                .with_header("Authorization", "{{token}}")
                .with_check(Check::status("protected route accessible", 200)),
        )
        .with_step(
            WorkflowStep::post("bulk_register", "{{base_url}}/register")
                .with_generator("bulk_username", ValueGenerator::random("bulk_user_"))
                .with_json_body(r#"{"username":"{{bulk_username}}","password":"bulk123"}"#)
                // A clash with an existing user is an acceptable answer under load
                .with_check(Check::status_in("bulk operation successful", [200, 400]))
                .with_parallel(BULK_REGISTRATIONS)
                .with_think_time(Duration::from_secs(2)),
        )
}

fn main() -> LoadlineResult<()> {
    let builder = ScenarioDefinitionBuilder::new_with_init(env!("CARGO_PKG_NAME"))
        .with_default_target_url("http://localhost:5000")
        .with_default_stages(vec![
            Stage::new(Duration::from_secs(120), 100),
            Stage::new(Duration::from_secs(300), 500),
            Stage::new(Duration::from_secs(120), 1000),
            Stage::new(Duration::from_secs(60), 100),
        ])
        .use_workflow(workflow())
        .with_threshold(HTTP_REQ_DURATION, "p(95)<1000")
        .with_threshold(ERRORS, "count<500");

    let result = run(builder)?;
    if !result.passed {
        std::process::exit(1);
    }

    Ok(())
}
