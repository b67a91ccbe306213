//! Page templates
//!
//! Templates are compiled into the binary and rendered with Tera. Every page
//! receives `site_name`, `year` and, when signed in, `current_user`.

use anyhow::Result;
use chrono::Datelike;
use serde::Serialize;
use std::error::Error as StdError;
use tera::{Context as TeraContext, Tera};

use crate::models::User;

const TEMPLATES: [(&str, &str); 6] = [
    ("base.html", include_str!("templates/base.html")),
    ("login.html", include_str!("templates/login.html")),
    ("register.html", include_str!("templates/register.html")),
    ("pending.html", include_str!("templates/pending.html")),
    ("home.html", include_str!("templates/home.html")),
    ("admin_users.html", include_str!("templates/admin_users.html")),
];

/// The signed-in account as templates see it
#[derive(Debug, Serialize)]
struct TemplateUser<'a> {
    id: i64,
    name: &'a str,
    email: &'a str,
    roles: Vec<&'static str>,
    role_labels: String,
    is_admin: bool,
}

impl<'a> From<&'a User> for TemplateUser<'a> {
    fn from(user: &'a User) -> Self {
        Self {
            id: user.id,
            name: &user.name,
            email: &user.email,
            roles: user.roles.iter().map(|r| r.as_str()).collect(),
            role_labels: user.roles.display_names(),
            is_admin: user.is_admin(),
        }
    }
}

pub struct PageRenderer {
    tera: Tera,
}

impl PageRenderer {
    pub fn new() -> Result<Self> {
        let mut tera = Tera::default();
        tera.add_raw_templates(TEMPLATES)?;
        Ok(Self { tera })
    }

    /// Render `template` with the standard variables added to `context`
    pub fn render(
        &self,
        template: &str,
        site_name: &str,
        current_user: Option<&User>,
        context: &TeraContext,
    ) -> Result<String> {
        let mut full_context = context.clone();
        full_context.insert("site_name", site_name);
        full_context.insert("year", &chrono::Utc::now().year());
        if let Some(user) = current_user {
            full_context.insert("current_user", &TemplateUser::from(user));
        }

        self.tera.render(template, &full_context).map_err(|e| {
            let mut error_msg = format!("Failed to render '{}': {}", template, e);
            let mut source = e.source();
            while let Some(s) = source {
                error_msg.push_str(&format!("\n  Caused by: {}", s));
                source = s.source();
            }
            anyhow::anyhow!(error_msg)
        })
    }
}
