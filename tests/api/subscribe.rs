use std::time::Duration;

use claims::assert_err_eq;
use claims::assert_none;
use claims::assert_ok_eq;
use claims::assert_some_eq;
use horecloud_newsletter::controller::Submission;
use horecloud_newsletter::controller::SubscriptionController;
use horecloud_newsletter::domain::Phase;
use horecloud_newsletter::domain::SubmitError;
use horecloud_newsletter::domain::FALLBACK_FAILURE_MESSAGE;
use horecloud_newsletter::domain::SUCCESS_MESSAGE;
use horecloud_newsletter::subscription_client::SubscriptionClient;
use wiremock::matchers::any;
use wiremock::matchers::body_json;
use wiremock::Mock;
use wiremock::MockServer;
use wiremock::ResponseTemplate;

use crate::helpers::spawn_form;
use crate::helpers::subscribe_request;
use crate::helpers::REQUEST_TIMEOUT;

fn subscribed() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(serde_json::json!({ "success": true }))
}

#[tokio::test]
async fn subscribe_ok() {
    let form = spawn_form().await;
    subscribe_request()
        .and(body_json(serde_json::json!({ "email": "a@b.com" })))
        .respond_with(subscribed())
        .expect(1)
        .mount(&form.subscription_server)
        .await;

    form.type_email("a@b.com");
    assert_ok_eq!(form.controller.submit().await, Submission::Succeeded);

    let attempt = form.controller.snapshot();
    assert_eq!(attempt.phase(), Phase::Succeeded);
    assert_eq!(attempt.email_input(), "");
    assert_some_eq!(attempt.message(), SUCCESS_MESSAGE);
    assert_eq!(attempt.button_label(), "Joined!");
}

#[tokio::test]
async fn address_is_trimmed_before_sending() {
    let form = spawn_form().await;
    subscribe_request()
        .and(body_json(serde_json::json!({ "email": "a@b.com" })))
        .respond_with(subscribed())
        .expect(1)
        .mount(&form.subscription_server)
        .await;

    form.type_email("  a@b.com ");
    assert_ok_eq!(form.controller.submit().await, Submission::Succeeded);
}

#[tokio::test]
async fn rate_limited() {
    let form = spawn_form().await;
    subscribe_request()
        .respond_with(ResponseTemplate::new(429).set_body_json(serde_json::json!({
            "message": "Slow down, try again later."
        })))
        .expect(1)
        .mount(&form.subscription_server)
        .await;

    form.type_email("a@b.com");
    assert_ok_eq!(
        form.controller.submit().await,
        Submission::Failed {
            message: "Slow down, try again later.".to_string()
        }
    );

    let attempt = form.controller.snapshot();
    assert_eq!(attempt.phase(), Phase::Failed);
    assert_some_eq!(attempt.message(), "Slow down, try again later.");
    assert_eq!(attempt.email_input(), "a@b.com");
    assert_eq!(attempt.notification().unwrap().title, "Error!");
}

#[tokio::test]
async fn endpoint_too_slow() {
    let form = spawn_form().await;
    subscribe_request()
        .respond_with(subscribed().set_delay(REQUEST_TIMEOUT * 4))
        .expect(1)
        .mount(&form.subscription_server)
        .await;

    form.type_email("a@b.com");
    assert_ok_eq!(
        form.controller.submit().await,
        Submission::Failed {
            message: FALLBACK_FAILURE_MESSAGE.to_string()
        }
    );
    assert_eq!(form.controller.snapshot().phase(), Phase::Failed);
    assert_eq!(form.controller.snapshot().email_input(), "a@b.com");
}

#[tokio::test]
async fn endpoint_unreachable() {
    // pooled servers keep listening after drop; a bare one really goes away
    let uri = {
        let server = MockServer::builder().start().await;
        server.uri()
    };
    let client =
        SubscriptionClient::new(&uri, "/api/subscribe", Duration::from_millis(500)).unwrap();
    let controller = SubscriptionController::new(client, Duration::from_millis(200));

    controller.update_email("a@b.com").unwrap();
    assert_ok_eq!(
        controller.submit().await,
        Submission::Failed {
            message: FALLBACK_FAILURE_MESSAGE.to_string()
        }
    );
    assert_some_eq!(controller.snapshot().message(), FALLBACK_FAILURE_MESSAGE);
}

#[tokio::test]
async fn falsy_success_is_a_failure() {
    let form = spawn_form().await;
    subscribe_request()
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": false
        })))
        .expect(1)
        .mount(&form.subscription_server)
        .await;

    form.type_email("a@b.com");
    assert_ok_eq!(
        form.controller.submit().await,
        Submission::Failed {
            message: FALLBACK_FAILURE_MESSAGE.to_string()
        }
    );
}

#[tokio::test]
async fn invalid_input_makes_no_request() {
    let form = spawn_form().await;
    Mock::given(any())
        .respond_with(subscribed())
        .expect(0)
        .mount(&form.subscription_server)
        .await;

    for (input, expected) in [
        ("", SubmitError::EmptyEmail),
        ("   ", SubmitError::EmptyEmail),
        (
            "not-an-email",
            SubmitError::InvalidEmail("Invalid email: \"not-an-email\"".to_string()),
        ),
    ] {
        form.type_email(input);
        assert_err_eq!(form.controller.submit().await, expected, "{input:?}");
        assert_eq!(form.controller.snapshot().phase(), Phase::Idle);
        assert_none!(form.controller.snapshot().message());
    }
}

#[tokio::test]
async fn double_submit_sends_one_request() {
    let form = spawn_form().await;
    subscribe_request()
        .respond_with(subscribed().set_delay(Duration::from_millis(50)))
        .expect(1)
        .mount(&form.subscription_server)
        .await;

    form.type_email("a@b.com");
    let (first, second) = tokio::join!(form.controller.submit(), form.controller.submit());

    assert_ok_eq!(first, Submission::Succeeded);
    assert_err_eq!(second, SubmitError::InFlight);
}

#[tokio::test]
async fn no_resubscription_after_success() {
    let form = spawn_form().await;
    subscribe_request()
        .respond_with(subscribed())
        .expect(1)
        .mount(&form.subscription_server)
        .await;

    form.type_email("a@b.com");
    form.controller.submit().await.unwrap();

    assert!(form.controller.update_email("c@d.com").is_err());
    assert_err_eq!(
        form.controller.submit().await,
        SubmitError::AlreadySubscribed
    );

    // still locked once the notification is gone
    assert!(form.controller.dismiss());
    assert_eq!(form.controller.snapshot().phase(), Phase::SuccessHidden);
    assert_err_eq!(
        form.controller.submit().await,
        SubmitError::AlreadySubscribed
    );
}

#[tokio::test]
async fn retry_after_failure() {
    let form = spawn_form().await;
    // mocks are tried in the order they were mounted
    subscribe_request()
        .respond_with(ResponseTemplate::new(409).set_body_json(serde_json::json!({
            "message": "This email has already tried to subscribe."
        })))
        .up_to_n_times(1)
        .expect(1)
        .mount(&form.subscription_server)
        .await;
    subscribe_request()
        .respond_with(subscribed())
        .expect(1)
        .mount(&form.subscription_server)
        .await;

    form.type_email("a@b.com");
    assert!(matches!(
        form.controller.submit().await,
        Ok(Submission::Failed { .. })
    ));

    // no need to wait for (or dismiss) the error notification
    assert_ok_eq!(form.controller.submit().await, Submission::Succeeded);
    assert_eq!(form.controller.snapshot().email_input(), "");
}

#[tokio::test]
async fn caller_giving_up_unlocks_the_form() {
    let form = spawn_form().await;
    subscribe_request()
        .respond_with(
            ResponseTemplate::new(429)
                .set_body_json(serde_json::json!({ "message": "Slow down." }))
                .set_delay(Duration::from_millis(100)),
        )
        .up_to_n_times(1)
        .mount(&form.subscription_server)
        .await;
    subscribe_request()
        .respond_with(subscribed())
        .expect(1)
        .mount(&form.subscription_server)
        .await;

    form.type_email("a@b.com");
    assert!(
        tokio::time::timeout(Duration::from_millis(20), form.controller.submit())
            .await
            .is_err()
    );
    // the late reply to the abandoned request goes nowhere
    tokio::time::sleep(Duration::from_millis(100)).await;

    let attempt = form.controller.snapshot();
    assert_eq!(attempt.phase(), Phase::Failed);
    assert_eq!(attempt.email_input(), "a@b.com");
    assert_some_eq!(attempt.message(), FALLBACK_FAILURE_MESSAGE);

    assert_ok_eq!(form.controller.submit().await, Submission::Succeeded);
}
