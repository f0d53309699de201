use std::collections::HashMap;
use std::str::FromStr;

use crate::error::{AppError, AppResult};

/// A file part received from a multipart form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Text fields and file parts of a multipart form
///
/// Text values are looked up by name; a repeated text field keeps its last
/// value. File parts keep their order and may repeat under one name.
#[derive(Debug, Clone, Default)]
pub struct FormData {
    fields: HashMap<String, String>,
    files: Vec<(String, UploadedFile)>,
}

impl FormData {
    pub fn push_text(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(name.into(), value.into());
    }

    pub fn push_file(&mut self, name: impl Into<String>, file: UploadedFile) {
        self.files.push((name.into(), file));
    }

    /// Trimmed text value; blank values count as absent
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
    }

    pub fn optional<T: FromStr>(&self, name: &str) -> AppResult<Option<T>> {
        self.text(name)
            .map(|raw| {
                raw.parse::<T>().map_err(|_| {
                    AppError::InvalidInput(format!("{} is not valid: {}", name, raw))
                })
            })
            .transpose()
    }

    pub fn required<T: FromStr>(&self, name: &str) -> AppResult<T> {
        self.optional(name)?
            .ok_or_else(|| AppError::InvalidInput(format!("{} is required", name)))
    }

    /// Like [`FormData::required`] but rejects `NaN` and infinities
    pub fn required_float(&self, name: &str) -> AppResult<f64> {
        let value: f64 = self.required(name)?;
        if !value.is_finite() {
            return Err(AppError::InvalidInput(format!(
                "{} must be a finite number",
                name
            )));
        }
        Ok(value)
    }

    /// Removes and returns every file sent under `name`, in form order
    pub fn take_files(&mut self, name: &str) -> Vec<UploadedFile> {
        let (taken, rest): (Vec<_>, Vec<_>) = std::mem::take(&mut self.files)
            .into_iter()
            .partition(|(field, _)| field == name);
        self.files = rest;
        taken.into_iter().map(|(_, file)| file).collect()
    }

    /// Removes and returns the first file sent under `name`
    pub fn take_file(&mut self, name: &str) -> Option<UploadedFile> {
        let position = self.files.iter().position(|(field, _)| field == name)?;
        Some(self.files.remove(position).1)
    }
}
