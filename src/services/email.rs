//! Outbound email notifications
//!
//! Mail is best effort: callers log a failed send and carry on. When no SMTP
//! server is configured the portal runs with [`NoopNotifier`].

use crate::config::{MailConfig, PortalConfig};
use crate::db::repositories::UserRepository;
use crate::models::{DocumentCategory, User};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use std::sync::Arc;
use std::time::Duration;

/// A document that just became visible to readers
#[derive(Debug, Clone)]
pub struct DocumentNotice {
    pub title: String,
    pub slug: String,
    pub category: DocumentCategory,
    pub author_name: String,
    pub author_id: i64,
    /// `false` when an existing document moved to PUBLISHED
    pub is_new_document: bool,
}

/// Subject and plain-text body of one email
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailContent {
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Greet a freshly registered (still pending) account
    async fn send_welcome(&self, user: &User) -> Result<()>;

    /// Tell an account its role set changed
    async fn send_role_assignment(&self, user: &User, assigned_by: &str) -> Result<()>;

    /// Announce a published document to every approved account except the
    /// author. Returns once the broadcast has been scheduled.
    async fn broadcast_document(&self, notice: DocumentNotice) -> Result<()>;
}

/// Notifier used when mail is not configured
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn send_welcome(&self, user: &User) -> Result<()> {
        tracing::debug!("Mail not configured, skipping welcome email to {}", user.email);
        Ok(())
    }

    async fn send_role_assignment(&self, user: &User, _assigned_by: &str) -> Result<()> {
        tracing::debug!("Mail not configured, skipping role email to {}", user.email);
        Ok(())
    }

    async fn broadcast_document(&self, notice: DocumentNotice) -> Result<()> {
        tracing::debug!("Mail not configured, skipping broadcast for {}", notice.slug);
        Ok(())
    }
}

/// Pick the SMTP notifier when mail is configured, otherwise the no-op one
pub fn notifier_from_config(
    mail: &MailConfig,
    portal: &PortalConfig,
    users: Arc<dyn UserRepository>,
) -> Arc<dyn Notifier> {
    if !mail.is_configured() {
        tracing::warn!("SMTP not configured, email notifications are disabled");
        return Arc::new(NoopNotifier);
    }
    match SmtpNotifier::new(mail, portal, users) {
        Ok(notifier) => Arc::new(notifier),
        Err(e) => {
            tracing::error!("Failed to set up SMTP transport, email disabled: {:#}", e);
            Arc::new(NoopNotifier)
        }
    }
}

/// SMTP-backed notifier
#[derive(Clone)]
pub struct SmtpNotifier {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    site_name: String,
    base_url: String,
    batch_size: usize,
    batch_delay: Duration,
    users: Arc<dyn UserRepository>,
}

impl SmtpNotifier {
    pub fn new(
        mail: &MailConfig,
        portal: &PortalConfig,
        users: Arc<dyn UserRepository>,
    ) -> Result<Self> {
        let host = mail
            .smtp_host
            .as_deref()
            .ok_or_else(|| anyhow!("SMTP host not configured"))?;
        let from_email = mail
            .from_email
            .as_deref()
            .ok_or_else(|| anyhow!("SMTP from address not configured"))?;

        let from = format!("{} <{}>", mail.from_name, from_email)
            .parse::<Mailbox>()
            .map_err(|e| anyhow!("Invalid from address: {}", e))?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(host)
            .map_err(|e| anyhow!("Failed to create SMTP transport: {}", e))?
            .port(mail.smtp_port);
        if let (Some(username), Some(password)) = (&mail.smtp_username, &mail.smtp_password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(Self {
            mailer: builder.build(),
            from,
            site_name: portal.site_name.clone(),
            base_url: portal.base_url.trim_end_matches('/').to_string(),
            batch_size: mail.batch_size.max(1),
            batch_delay: Duration::from_millis(mail.batch_delay_ms),
            users,
        })
    }

    async fn send(&self, to_name: &str, to_email: &str, content: EmailContent) -> Result<()> {
        let to = format!("{} <{}>", to_name, to_email)
            .parse::<Mailbox>()
            .or_else(|_| to_email.parse::<Mailbox>())
            .map_err(|e| anyhow!("Invalid to address: {}", e))?;

        let email = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(content.subject)
            .header(ContentType::TEXT_PLAIN)
            .body(content.body)
            .map_err(|e| anyhow!("Failed to build email: {}", e))?;

        self.mailer
            .send(email)
            .await
            .map_err(|e| anyhow!("Failed to send email: {}", e))?;
        Ok(())
    }

    async fn run_broadcast(&self, notice: DocumentNotice) {
        let recipients: Vec<User> = match self.users.list_approved().await {
            Ok(users) => users.into_iter().filter(|u| u.id != notice.author_id).collect(),
            Err(e) => {
                tracing::error!("Failed to load broadcast recipients: {:#}", e);
                return;
            }
        };

        tracing::info!(
            "Sending document notification to {} users for document: {}",
            recipients.len(),
            notice.title
        );

        let batches: Vec<&[User]> = recipients.chunks(self.batch_size).collect();
        let batch_count = batches.len();
        for (index, batch) in batches.into_iter().enumerate() {
            let sends = batch.iter().map(|user| {
                let content = document_email(&self.site_name, &self.base_url, &notice, &user.name);
                async move {
                    if let Err(e) = self.send(&user.name, &user.email, content).await {
                        tracing::warn!("Failed to send document notification to {}: {:#}", user.email, e);
                    }
                }
            });
            futures::future::join_all(sends).await;

            if index + 1 < batch_count {
                tokio::time::sleep(self.batch_delay).await;
            }
        }

        tracing::info!("Finished document notifications for {}", notice.slug);
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send_welcome(&self, user: &User) -> Result<()> {
        self.send(&user.name, &user.email, welcome_email(&self.site_name, &user.name))
            .await
    }

    async fn send_role_assignment(&self, user: &User, assigned_by: &str) -> Result<()> {
        let content = role_assignment_email(&self.site_name, &self.base_url, user, assigned_by);
        self.send(&user.name, &user.email, content).await
    }

    async fn broadcast_document(&self, notice: DocumentNotice) -> Result<()> {
        let this = self.clone();
        tokio::spawn(async move {
            this.run_broadcast(notice).await;
        });
        Ok(())
    }
}

fn timestamp() -> String {
    Utc::now().format("%d.%m.%Y %H:%M").to_string()
}

pub fn welcome_email(site_name: &str, user_name: &str) -> EmailContent {
    let subject = format!("Xoş Gəlmisiniz - {}", site_name);
    let body = format!(
        "{subject}\n\n\
         Xoş Gəlmisiniz, {user_name}!\n\n\
         {site_name}-da hesabınız uğurla yaradıldı.\n\
         Hesabınız hal-hazırda administrasiya tərəfindən yoxlanılır.\n\n\
         Portala tam giriş üçün adminlərin təsdiqini gözləyin.\n\
         Təsdiqdən sonra ayrıca e-poçt bildirişi alacaqsınız.\n\n\
         Bu e-poçt avtomatik olaraq göndərilib.\n"
    );
    EmailContent { subject, body }
}

pub fn role_assignment_email(
    site_name: &str,
    base_url: &str,
    user: &User,
    assigned_by: &str,
) -> EmailContent {
    let has_roles = !user.roles.is_empty();
    let roles_list = user.roles.display_names();

    let subject = if has_roles {
        format!("Hesabınıza Rol Təyin Edildi - {}", site_name)
    } else {
        format!("Hesab Rolları Yeniləndi - {}", site_name)
    };

    let status = if has_roles {
        format!("Təyin Edilmiş Rollar: {}", roles_list)
    } else {
        "Hesab Statusu: Rol yoxdur - Administrasiya yoxlanması gözlənilir".to_string()
    };
    let detail = if has_roles {
        let noun = if user.roles.len() > 1 { "rolları" } else { "rolu" };
        format!(
            "Təbriklər! Hesabınız təsdiqləndi və sizə {} {} təyin edildi. İndi portala tam giriş əldə edə bilərsiniz.",
            roles_list, noun
        )
    } else {
        "Hesabınızdan bütün rollar silindi və hesabınız yenidən yoxlanma prosesindədir.".to_string()
    };

    let body = format!(
        "{subject}\n\n\
         Salam, {name}!\n\n\
         Hesabınızın rol statusu yeniləndi.\n\n\
         {status}\n\n\
         {detail}\n\n\
         Rol təyin edən administrator: {assigned_by}\n\
         Tarix: {date}\n\n\
         Portal: {base_url}\n",
        name = user.name,
        date = timestamp(),
    );
    EmailContent { subject, body }
}

pub fn document_email(
    site_name: &str,
    base_url: &str,
    notice: &DocumentNotice,
    user_name: &str,
) -> EmailContent {
    let subject = if notice.is_new_document {
        format!("Yeni Sənəd Yaradıldı: {} - {}", notice.title, site_name)
    } else {
        format!("Sənəd Nəşr Edildi: {} - {}", notice.title, site_name)
    };
    let intro = if notice.is_new_document {
        "Portala yeni sənəd əlavə edildi:"
    } else {
        "Mövcud sənəd nəşr edildi və indi görünən statusdadır:"
    };

    let body = format!(
        "{subject}\n\n\
         Salam, {user_name}!\n\n\
         {intro}\n\n\
         Sənəd: {title}\n\
         Kateqoriya: {category}\n\
         Müəllif: {author}\n\
         Tarix: {date}\n\n\
         Sənədi oxumaq üçün: {base_url}/docs/{slug}\n",
        title = notice.title,
        category = notice.category.display_name(),
        author = notice.author_name,
        date = timestamp(),
        slug = notice.slug,
    );
    EmailContent { subject, body }
}
