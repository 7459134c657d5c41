//! Message content for emails and chat cards.
//!
//! Everything here is a pure function of its input so the content can be
//! asserted on without a provider.

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::registration::{HostNotification, VisitorRegistration, WelcomePackageOptions};

/// Default filename for an attached NDA.
pub const DEFAULT_NDA_FILENAME: &str = "NDA_Document.pdf";
/// Studio map attachment name.
pub const STUDIO_MAP_FILENAME: &str = "SQLA_Studio_Map.pdf";
/// WiFi and access attachment name.
pub const WIFI_INFO_FILENAME: &str = "WiFi_and_Access_Info.pdf";

/// A rendered email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailTemplate {
    /// Subject line.
    pub subject: String,
    /// HTML body.
    pub html: String,
    /// Plain-text body.
    pub text: String,
}

/// A file attached to an email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// Filename shown to the recipient.
    pub filename: String,
    /// Raw content.
    pub content: Vec<u8>,
    /// MIME type.
    pub content_type: String,
}

impl Attachment {
    fn pdf(filename: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            content,
            content_type: "application/pdf".to_string(),
        }
    }
}

/// Practical details printed in the welcome email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudioInfo {
    /// Street address.
    pub address: String,
    /// Guest WiFi password.
    pub wifi_password: String,
    /// Emergency phone.
    pub emergency_contact: String,
}

impl Default for StudioInfo {
    fn default() -> Self {
        Self {
            address: "123 Studio Drive, Los Angeles, CA 90210".to_string(),
            wifi_password: "StudioGuest2024".to_string(),
            emergency_contact: "+1 (555) 123-4567".to_string(),
        }
    }
}

/// Host-arrival email.
#[must_use]
pub fn host_notification_email(data: &HostNotification) -> EmailTemplate {
    let subject = format!("New Visitor Arrival: {}", data.visitor_name);

    let company_row = data
        .visitor_company
        .as_ref()
        .map(|c| format!("<tr><td><strong>Company:</strong></td><td>{c}</td></tr>"))
        .unwrap_or_default();
    let record_link = data
        .record_url
        .as_ref()
        .map(|url| format!(r#"<p><a href="{url}">View Full Record</a></p>"#))
        .unwrap_or_default();

    let html = format!(
        "<h1>SQLA Studio</h1>\
         <h2>Hello {host},</h2>\
         <p>You have a new visitor waiting for you at SQLA Studio.</p>\
         <table>\
         <tr><td><strong>Name:</strong></td><td>{name}</td></tr>\
         <tr><td><strong>Email:</strong></td><td>{email}</td></tr>\
         {company_row}\
         <tr><td><strong>Arrival Time:</strong></td><td>{time}</td></tr>\
         </table>\
         {record_link}\
         <p>Please come to the reception area to meet your visitor.</p>",
        host = data.host_name,
        name = data.visitor_name,
        email = data.visitor_email,
        time = data.visit_time,
    );

    let mut text = format!(
        "SQLA Studio - Visitor Notification\n\n\
         Hello {},\n\n\
         You have a new visitor waiting for you at SQLA Studio.\n\n\
         Visitor Information:\n\
         - Name: {}\n\
         - Email: {}\n",
        data.host_name, data.visitor_name, data.visitor_email
    );
    if let Some(company) = &data.visitor_company {
        text.push_str(&format!("- Company: {company}\n"));
    }
    text.push_str(&format!("- Arrival Time: {}\n", data.visit_time));
    if let Some(url) = &data.record_url {
        text.push_str(&format!("\nView full record: {url}\n"));
    }
    text.push_str("\nPlease come to the reception area to meet your visitor.\n");

    EmailTemplate { subject, html, text }
}

/// Welcome email for a visitor.
#[must_use]
pub fn welcome_email(reg: &VisitorRegistration, visit_date: &str, studio: &StudioInfo) -> EmailTemplate {
    let name = reg.full_name();
    let subject = "Welcome to SQLA Studio - Visit Information".to_string();

    let html = format!(
        "<h1>Welcome to SQLA Studio</h1>\
         <p>Hello {name},</p>\
         <p>Thank you for visiting SQLA Studio! We're excited to have you here.</p>\
         <h3>Your Visit Details</h3>\
         <p><strong>Host:</strong> {host}<br><strong>Date:</strong> {visit_date}</p>\
         <h3>Studio Information</h3>\
         <p><strong>Address:</strong> {address}<br>\
         <strong>WiFi Password:</strong> {wifi}<br>\
         <strong>Emergency Contact:</strong> {emergency}</p>",
        host = reg.host_name,
        address = studio.address,
        wifi = studio.wifi_password,
        emergency = studio.emergency_contact,
    );

    let text = format!(
        "Welcome to SQLA Studio\n\n\
         Hello {name},\n\n\
         Thank you for visiting SQLA Studio! We're excited to have you here.\n\n\
         Your Visit Details:\n\
         - Host: {host}\n\
         - Date: {visit_date}\n\n\
         Studio Information:\n\
         - Address: {address}\n\
         - WiFi Password: {wifi}\n\
         - Emergency Contact: {emergency}\n\n\
         Important Safety Guidelines:\n\
         - Please wear your visitor badge at all times\n\
         - Stay with your host throughout your visit\n\
         - In case of emergency, contact security immediately\n",
        host = reg.host_name,
        address = studio.address,
        wifi = studio.wifi_password,
        emergency = studio.emergency_contact,
    );

    EmailTemplate { subject, html, text }
}

/// Attachments for a welcome package.
#[must_use]
pub fn welcome_attachments(reg: &VisitorRegistration, options: &WelcomePackageOptions) -> Vec<Attachment> {
    let mut attachments = Vec::new();

    if options.include_pdf {
        if let Some(pdf) = &reg.pdf {
            let filename = reg
                .pdf_filename
                .clone()
                .unwrap_or_else(|| DEFAULT_NDA_FILENAME.to_string());
            attachments.push(Attachment::pdf(filename, pdf.clone()));
        }
    }
    if options.include_studio_map {
        attachments.push(Attachment::pdf(
            STUDIO_MAP_FILENAME,
            placeholder_pdf("SQLA Studio Map - Coming Soon"),
        ));
    }
    if options.include_wifi_info {
        attachments.push(Attachment::pdf(
            WIFI_INFO_FILENAME,
            placeholder_pdf("WiFi and Access Information - Coming Soon"),
        ));
    }

    attachments
}

/// A one-page PDF carrying a single line of text.
#[must_use]
pub fn placeholder_pdf(line: &str) -> Vec<u8> {
    let stream = format!("BT\n/F1 12 Tf\n72 720 Td\n({line}) Tj\nET");
    format!(
        "%PDF-1.4\n\
         1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n\
         2 0 obj\n<< /Type /Pages /Kids [3 0 R] /Count 1 >>\nendobj\n\
         3 0 obj\n<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R >>\nendobj\n\
         4 0 obj\n<< /Length {} >>\nstream\n{stream}\nendstream\nendobj\n\
         trailer\n<< /Size 5 /Root 1 0 R >>\n%%EOF",
        stream.len()
    )
    .into_bytes()
}

/// Chat card announcing a visitor.
#[must_use]
pub fn visitor_arrival_card(
    reg: &VisitorRegistration,
    arrival_time: &str,
    record_url: Option<&str>,
) -> serde_json::Value {
    let name = reg.full_name();

    let mut visitor_widgets = vec![
        key_value("Name", &name, "PERSON"),
        key_value("Email", &reg.email, "EMAIL"),
    ];
    if let Some(company) = &reg.company_name {
        visitor_widgets.push(key_value("Company", company, "BOOKMARK"));
    }
    visitor_widgets.push(key_value("Arrival Time", arrival_time, "CLOCK"));

    let mut sections = vec![
        json!({ "header": "Visitor Information", "widgets": visitor_widgets }),
        json!({
            "header": "Host Information",
            "widgets": [
                key_value("Host Name", &reg.host_name, "PERSON"),
                key_value("Host Email", &reg.host_email, "EMAIL"),
            ]
        }),
    ];
    if let Some(url) = record_url {
        sections.push(json!({
            "widgets": [{
                "buttons": [{
                    "textButton": {
                        "text": "View Monday.com Record",
                        "onClick": { "openLink": { "url": url } }
                    }
                }]
            }]
        }));
    }

    json!({
        "text": "New visitor arrival at SQLA Studio",
        "cards": [{
            "header": {
                "title": format!("Visitor: {name}"),
                "subtitle": format!("Host: {}", reg.host_name),
            },
            "sections": sections,
        }]
    })
}

fn key_value(label: &str, content: &str, icon: &str) -> serde_json::Value {
    json!({ "keyValue": { "topLabel": label, "content": content, "icon": icon } })
}
