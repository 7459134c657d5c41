//! The visitor snapshot handed to the pipeline.

use serde::{Deserialize, Serialize};

/// Everything the kiosk collected by the time the NDA is signed.
///
/// The pipeline only reads it. Binary blobs never travel through JSON; they
/// are attached with the `with_*` builders by whoever captured them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VisitorRegistration {
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
    /// Visitor email address.
    pub email: String,
    /// Contact phone.
    pub phone: Option<String>,
    /// Organisation the visitor represents.
    pub company_name: Option<String>,
    /// Job title.
    pub position: Option<String>,
    /// Staff directory id of the host.
    pub host_id: String,
    /// Host display name.
    pub host_name: String,
    /// Host email address.
    pub host_email: String,
    /// Captured photo bytes.
    #[serde(skip)]
    pub photo: Option<Vec<u8>>,
    /// Photo preview URL.
    pub photo_url: Option<String>,
    /// Signature PNG bytes.
    #[serde(skip)]
    pub signature_blob: Option<Vec<u8>>,
    /// `data:image/png;base64,...` as produced by the signature pad.
    #[serde(alias = "signature", alias = "signatureUrl")]
    pub signature_data_url: Option<String>,
    /// Whether the NDA was accepted.
    pub nda_accepted: bool,
    /// Signed NDA document.
    #[serde(skip)]
    pub pdf: Option<Vec<u8>>,
    /// Filename for the signed NDA.
    pub pdf_filename: Option<String>,
}

impl VisitorRegistration {
    /// Creates a registration with the visitor's identity filled in.
    #[must_use]
    pub fn new(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
            email: email.into(),
            ..Self::default()
        }
    }

    /// Sets the host the visitor is meeting.
    #[must_use]
    pub fn with_host(
        mut self,
        id: impl Into<String>,
        name: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        self.host_id = id.into();
        self.host_name = name.into();
        self.host_email = email.into();
        self
    }

    /// Sets the visitor's company.
    #[must_use]
    pub fn with_company(mut self, company: impl Into<String>) -> Self {
        self.company_name = Some(company.into());
        self
    }

    /// Attaches the captured photo.
    #[must_use]
    pub fn with_photo(mut self, bytes: Vec<u8>) -> Self {
        self.photo = Some(bytes);
        self
    }

    /// Attaches the signature as raw PNG bytes.
    #[must_use]
    pub fn with_signature_blob(mut self, bytes: Vec<u8>) -> Self {
        self.signature_blob = Some(bytes);
        self
    }

    /// Attaches the signature as a data URL.
    #[must_use]
    pub fn with_signature_data_url(mut self, data_url: impl Into<String>) -> Self {
        self.signature_data_url = Some(data_url.into());
        self
    }

    /// Attaches the signed NDA.
    #[must_use]
    pub fn with_pdf(mut self, bytes: Vec<u8>, filename: impl Into<String>) -> Self {
        self.pdf = Some(bytes);
        self.pdf_filename = Some(filename.into());
        self.nda_accepted = true;
        self
    }

    /// `"{first} {last}"`.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// True when a signed NDA document is attached.
    #[must_use]
    pub fn has_pdf(&self) -> bool {
        self.pdf.is_some()
    }
}
