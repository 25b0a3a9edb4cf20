// Outbound invitation email

use std::{sync::Arc, time::Duration};

use anyhow::{Context, anyhow};
use async_trait::async_trait;
use orgkit_core::{
    config::MailerConfig,
    notification::{InvitationEmail, InvitationNotifier, InvitationNotifierRef},
};
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, info};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Notifier for the configured mailer. Without an API key, invitations are
/// only logged.
pub fn build_notifier(config: &MailerConfig) -> anyhow::Result<InvitationNotifierRef> {
    match config.api_key.as_deref() {
        Some(api_key) => Ok(Arc::new(HttpMailer::new(config, api_key)?)),
        None => {
            info!("no mailer API key configured; invitation emails will be logged");
            Ok(Arc::new(LogMailer))
        }
    }
}

#[derive(Serialize)]
struct SendEmailRequest<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: &'a str,
}

/// Sends through a JSON email API (`POST {from, to, subject, html}` with a
/// bearer key).
pub struct HttpMailer {
    client: Client,
    api_url: String,
    api_key: String,
    from: String,
}

impl HttpMailer {
    pub fn new(config: &MailerConfig, api_key: &str) -> anyhow::Result<Self> {
        let client = Client::builder()
            .user_agent(format!("orgkit-server/{}", env!("CARGO_PKG_VERSION")))
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("build mailer http client")?;

        Ok(Self {
            client,
            api_url: config.api_url.clone(),
            api_key: api_key.to_owned(),
            from: format!("{} <{}>", config.from_name, config.from_email),
        })
    }
}

#[async_trait]
impl InvitationNotifier for HttpMailer {
    async fn send_invitation(&self, email: &InvitationEmail) -> anyhow::Result<()> {
        let subject = invitation_subject(email);
        let html = render_invitation_html(email);
        let body = SendEmailRequest {
            from: &self.from,
            to: [email.to.as_str()],
            subject: &subject,
            html: &html,
        };

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("request mailer API")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unavailable>".to_string());
            return Err(anyhow!("mailer API error {status}: {body}"));
        }

        debug!(to = %email.to, "invitation email accepted by mailer");
        Ok(())
    }
}

/// Development stand-in that records the acceptance link in the log.
pub struct LogMailer;

#[async_trait]
impl InvitationNotifier for LogMailer {
    async fn send_invitation(&self, email: &InvitationEmail) -> anyhow::Result<()> {
        info!(
            to = %email.to,
            org_name = %email.org_name,
            role = %email.role,
            acceptance_url = %email.acceptance_url,
            "invitation email (not sent)"
        );
        Ok(())
    }
}

pub(crate) fn invitation_subject(email: &InvitationEmail) -> String {
    format!("You've been invited to join {}", email.org_name)
}

pub(crate) fn render_invitation_html(email: &InvitationEmail) -> String {
    let org_name = escape_html(&email.org_name);
    let inviter_name = escape_html(&email.inviter_name);
    let url = escape_html(&email.acceptance_url);
    let target = match email.project_name.as_deref() {
        Some(project) => format!(
            "the <strong>{}</strong> project in <strong>{org_name}</strong>",
            escape_html(project)
        ),
        None => format!("<strong>{org_name}</strong>"),
    };

    format!(
        r#"<div style="font-family:sans-serif;max-width:600px;margin:0 auto;padding:24px">
  <h2 style="margin-bottom:8px">You've been invited to join {org_name}</h2>
  <p style="color:#555;margin-bottom:24px">
    <strong>{inviter_name}</strong> has invited you to join {target} as a <strong>{role}</strong>.
  </p>
  <a href="{url}" style="display:inline-block;background:#000;color:#fff;padding:12px 24px;border-radius:6px;text-decoration:none;font-weight:600">Accept Invitation</a>
  <p style="color:#888;font-size:13px;margin-top:24px">This invitation expires in 7 days. If you weren't expecting this, you can ignore it.</p>
  <p style="color:#aaa;font-size:12px">Link: {url}</p>
</div>"#,
        role = email.role,
    )
}

fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        Json, Router,
        extract::State,
        http::{HeaderMap, StatusCode, header::AUTHORIZATION},
        routing::post,
    };
    use orgkit_core::Role;
    use serde_json::Value as JsonValue;
    use tokio::{net::TcpListener, sync::Mutex};

    type Captured = Arc<Mutex<Vec<(Option<String>, JsonValue)>>>;

    fn sample_email() -> InvitationEmail {
        InvitationEmail {
            to: "bob@x.com".into(),
            inviter_name: "Alice".into(),
            org_name: "Acme <R&D>".into(),
            project_name: None,
            role: Role::Member,
            acceptance_url: "http://localhost:3000/invite/abc".into(),
        }
    }

    async fn spawn_mail_api(status: StatusCode) -> (String, Captured) {
        let captured: Captured = Arc::default();
        let app = Router::new()
            .route(
                "/emails",
                post(
                    move |State(captured): State<Captured>,
                          headers: HeaderMap,
                          Json(body): Json<JsonValue>| async move {
                        let auth = headers
                            .get(AUTHORIZATION)
                            .and_then(|value| value.to_str().ok())
                            .map(str::to_owned);
                        captured.lock().await.push((auth, body));
                        (status, Json(serde_json::json!({ "id": "email_1" })))
                    },
                ),
            )
            .with_state(captured.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("serve mail api");
        });
        (format!("http://{addr}/emails"), captured)
    }

    fn mailer_config(api_url: String) -> MailerConfig {
        MailerConfig {
            api_url,
            api_key: Some("re_test".into()),
            from_name: "Acme".into(),
            from_email: "team@acme.test".into(),
        }
    }

    #[test]
    fn html_escapes_names_and_states_expiry() {
        let html = render_invitation_html(&sample_email());
        assert!(html.contains("Acme &lt;R&amp;D&gt;"));
        assert!(!html.contains("<R&D>"));
        assert!(html.contains("expires in 7 days"));
        assert!(html.contains("http://localhost:3000/invite/abc"));
        assert!(html.contains("<strong>member</strong>"));
    }

    #[test]
    fn html_mentions_project_when_scoped() {
        let mut email = sample_email();
        email.project_name = Some("Website".into());
        let html = render_invitation_html(&email);
        assert!(html.contains("the <strong>Website</strong> project"));
    }

    #[test]
    fn notifier_without_key_logs() {
        let notifier = build_notifier(&MailerConfig::default());
        assert!(notifier.is_ok());
    }

    #[tokio::test]
    async fn http_mailer_posts_json_with_bearer_key() {
        let (url, captured) = spawn_mail_api(StatusCode::OK).await;
        let mailer = HttpMailer::new(&mailer_config(url), "re_test").expect("mailer");

        mailer
            .send_invitation(&sample_email())
            .await
            .expect("send email");

        let captured = captured.lock().await;
        assert_eq!(captured.len(), 1);
        let (auth, body) = &captured[0];
        assert_eq!(auth.as_deref(), Some("Bearer re_test"));
        assert_eq!(body["from"], "Acme <team@acme.test>");
        assert_eq!(body["to"][0], "bob@x.com");
        assert_eq!(body["subject"], "You've been invited to join Acme <R&D>");
    }

    #[tokio::test]
    async fn http_mailer_reports_api_errors() {
        let (url, _captured) = spawn_mail_api(StatusCode::UNPROCESSABLE_ENTITY).await;
        let mailer = HttpMailer::new(&mailer_config(url), "re_test").expect("mailer");

        let err = mailer
            .send_invitation(&sample_email())
            .await
            .expect_err("api rejected the email");
        assert!(err.to_string().contains("422"));
    }
}
