//! Email triage service entry point.
//!
//! Polls the Gmail inbox for unread tenant inquiries, generates replies with
//! property and conversation context, and drafts or sends them. Set
//! `TRIAGE_RUN_ONCE=true` to process a single pass and exit (the scheduled /
//! cloud-invocation shape); otherwise the service polls at
//! `TRIAGE_POLL_INTERVAL_SECS`.

use triage_module::service::{ServiceConfig, TriagePoller, TriageService};
use triage_module::PassOutcome;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_target(false).init();

    let config = ServiceConfig::from_env()?;
    let poll_interval = config.poll_interval;
    let run_once = config.run_once;

    let service = TriageService::from_config(config)?;

    if run_once {
        match service.process_next_unread()? {
            PassOutcome::NoUnread => println!("No unread emails found."),
            PassOutcome::Processed {
                correspondent,
                draft_id,
            } => match draft_id {
                Some(draft_id) => {
                    println!("Draft {} created for {}.", draft_id, correspondent)
                }
                None => println!("Replied to {}.", correspondent),
            },
        }
        return Ok(());
    }

    TriagePoller::new(service, poll_interval).run()?;
    Ok(())
}
