use horecloud_newsletter::configuration::get_configuration;
use horecloud_newsletter::controller::SubscriptionController;
use horecloud_newsletter::domain::SubscriptionAttempt;
use horecloud_newsletter::telemetry::get_subscriber;
use horecloud_newsletter::telemetry::init_subscriber;
use tokio::io::AsyncBufReadExt;
use tokio::io::BufReader;
use tokio::sync::watch;

/// Print the notification whenever it appears, changes, or goes away. This is
/// the whole "presentation layer": it only ever reads what the controller
/// publishes.
async fn render(mut changes: watch::Receiver<SubscriptionAttempt>) {
    let mut shown: Option<String> = None;
    while changes.changed().await.is_ok() {
        let attempt = changes.borrow_and_update().clone();
        let current = attempt
            .notification()
            .map(|n| format!("{} {}", n.title, n.message));
        if current == shown {
            continue;
        }
        match &current {
            Some(line) => println!("{line}"),
            None => println!("({})", attempt.button_label()),
        }
        shown = current;
    }
}

/// Load config, initialise telemetry, and drive the subscribe form from stdin
/// until `:quit` or EOF.
#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let cfg = get_configuration()?;

    // logs go to stderr, so they don't interleave with the "form" on stdout
    let subscriber = get_subscriber(
        &cfg.application.name,
        &cfg.application.log_level,
        std::io::stderr,
    );
    init_subscriber(subscriber)?;

    let controller = SubscriptionController::build(&cfg.subscription)?;
    let renderer = tokio::spawn(render(controller.changes()));

    println!("Stay Updated: subscribe for product updates.");
    println!("Type an email address and press enter. `:dismiss` hides the notification, `:quit` exits.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match line.trim() {
            ":quit" => break,
            ":dismiss" => {
                controller.dismiss();
            }
            text => {
                if let Err(e) = controller.update_email(text) {
                    println!("{e}");
                    continue;
                }
                // outcomes are printed by `render`; only local rejections
                // are reported here
                if let Err(e) = controller.submit().await {
                    println!("{e}");
                }
            }
        }
    }

    // dropping the controller disposes it and closes the change feed, which
    // ends `render`
    drop(controller);
    if let Err(e) = renderer.await {
        tracing::error!(
            error.cause_chain = ?e,
            error.message = %e,
            "Renderer failed"
        );
    }
    Ok(())
}
