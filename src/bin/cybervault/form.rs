//! Add-record form state: one text buffer per draft field and a focus cursor.

use std::num::IntErrorKind;

use cybervault::record::MAX_AGE;
use cybervault::ProfileDraft;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FormField {
    FullName,
    Email,
    PhoneNumber,
    Age,
    NationalId,
    DrivingLicense,
    ResidenceAddress,
    Photo,
}

impl FormField {
    pub(crate) const ALL: [FormField; 8] = [
        FormField::FullName,
        FormField::Email,
        FormField::PhoneNumber,
        FormField::Age,
        FormField::NationalId,
        FormField::DrivingLicense,
        FormField::ResidenceAddress,
        FormField::Photo,
    ];

    pub(crate) fn label(self) -> &'static str {
        match self {
            FormField::FullName => "Full name *",
            FormField::Email => "Email *",
            FormField::PhoneNumber => "Phone *",
            FormField::Age => "Age",
            FormField::NationalId => "National ID",
            FormField::DrivingLicense => "Driving license",
            FormField::ResidenceAddress => "Residence address",
            FormField::Photo => "Photo (URL or data URL)",
        }
    }

    fn index(self) -> usize {
        Self::ALL.iter().position(|f| *f == self).unwrap_or(0)
    }
}

#[derive(Debug, Clone)]
pub(crate) struct AddForm {
    values: [String; 8],
    focus: FormField,
}

impl Default for AddForm {
    fn default() -> Self {
        Self {
            values: Default::default(),
            focus: FormField::FullName,
        }
    }
}

impl AddForm {
    pub(crate) fn focus(&self) -> FormField {
        self.focus
    }

    pub(crate) fn value(&self, field: FormField) -> &str {
        &self.values[field.index()]
    }

    pub(crate) fn focus_next(&mut self) {
        let next = (self.focus.index() + 1) % FormField::ALL.len();
        self.focus = FormField::ALL[next];
    }

    pub(crate) fn focus_prev(&mut self) {
        let len = FormField::ALL.len();
        let prev = (self.focus.index() + len - 1) % len;
        self.focus = FormField::ALL[prev];
    }

    pub(crate) fn push_char(&mut self, ch: char) {
        if ch.is_control() {
            return;
        }
        self.values[self.focus.index()].push(ch);
    }

    pub(crate) fn backspace(&mut self) {
        self.values[self.focus.index()].pop();
    }

    /// Build a draft. Only the age text is checked here; required fields are
    /// the controller's job.
    pub(crate) fn to_draft(&self) -> Result<ProfileDraft, String> {
        let text = |field: FormField| self.value(field).to_string();
        let optional = |field: FormField| {
            let value = self.value(field).trim();
            (!value.is_empty()).then(|| value.to_string())
        };
        let age = parse_age(self.value(FormField::Age).trim())?;
        Ok(ProfileDraft {
            full_name: text(FormField::FullName),
            email: text(FormField::Email),
            phone_number: text(FormField::PhoneNumber),
            age,
            national_id: optional(FormField::NationalId),
            driving_license: optional(FormField::DrivingLicense),
            residence_address: optional(FormField::ResidenceAddress),
            photo: optional(FormField::Photo),
        })
    }
}

fn parse_age(text: &str) -> Result<Option<u8>, String> {
    if text.is_empty() {
        return Ok(None);
    }
    let out_of_range = || format!("age must be between 0 and {MAX_AGE}, got '{text}'");
    match text.parse::<u8>() {
        Ok(age) if age <= MAX_AGE => Ok(Some(age)),
        Ok(_) => Err(out_of_range()),
        Err(err) if *err.kind() == IntErrorKind::PosOverflow => Err(out_of_range()),
        Err(_) => Err(format!("age must be a whole number, got '{text}'")),
    }
}
