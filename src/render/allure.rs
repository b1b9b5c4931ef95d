//! Allure results directory writer.
//!
//! Each test becomes `<uuid>-result.json`; every entry becomes a step whose
//! attachments are written next to it as `<uuid>-attachment.<ext>`.

use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

use super::ReportSink;
use crate::config::Config;
use crate::error::{ExtrasError, ExtrasResult};
use crate::mime::{Mime, unknown_extension};
use crate::record::{Attachment, Entry, Status, Step, TestRecord};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AllureResult {
    pub uuid: String,
    pub history_id: String,
    pub full_name: String,
    pub name: String,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_details: Option<StatusDetails>,
    pub stage: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub start: i64,
    pub stop: i64,
    pub parameters: Vec<AllureParameter>,
    pub links: Vec<AllureLink>,
    pub labels: Vec<AllureLabel>,
    pub steps: Vec<AllureStep>,
    pub attachments: Vec<AllureAttachment>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AllureParameter {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AllureLink {
    #[serde(rename = "type")]
    pub kind: String,
    pub url: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AllureLabel {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AllureStep {
    pub name: String,
    pub status: &'static str,
    pub stage: &'static str,
    pub start: i64,
    pub stop: i64,
    pub parameters: Vec<AllureParameter>,
    pub attachments: Vec<AllureAttachment>,
    pub steps: Vec<AllureStep>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AllureAttachment {
    pub name: String,
    pub source: String,
    #[serde(rename = "type")]
    pub mime: String,
}

/// Allure status of a test status
pub fn allure_status(status: Status) -> &'static str {
    match status {
        Status::Passed | Status::XPassed => "passed",
        Status::Failed => "failed",
        Status::Error => "broken",
        Status::Skipped | Status::XFailed => "skipped",
        Status::Unknown => "unknown",
    }
}

/// Writes Allure result files into a results directory
#[derive(Debug)]
pub struct AllureResults {
    dir: PathBuf,
    host: String,
    written: Vec<PathBuf>,
}

impl AllureResults {
    /// Results directory configured by `allure_dir`
    pub fn new(config: &Config) -> ExtrasResult<Self> {
        let dir = config
            .allure_dir
            .clone()
            .ok_or_else(|| ExtrasError::invalid("no allure_dir configured"))?;
        Self::in_dir(dir)
    }

    pub fn in_dir(dir: impl Into<PathBuf>) -> ExtrasResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        let host = hostname::get()
            .map(|h| h.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "localhost".to_string());
        Ok(Self {
            dir,
            host,
            written: Vec::new(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Result files written so far
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }

    fn write_attachment(&self, name: &str, data: &[u8], mime: &str, ext: &str) -> ExtrasResult<AllureAttachment> {
        let source = format!("{}-attachment.{}", Uuid::new_v4(), ext);
        fs::write(self.dir.join(&source), data)?;
        Ok(AllureAttachment {
            name: name.to_string(),
            source,
            mime: mime.to_string(),
        })
    }

    fn step_attachments(&self, step: &Step) -> ExtrasResult<Vec<AllureAttachment>> {
        let mut attachments = Vec::new();
        if let Some(image) = &step.image {
            let name = if step.comment.is_empty() { "screenshot" } else { step.comment.as_str() };
            attachments.push(self.write_attachment(
                name,
                &image.data,
                image.mime.as_str(),
                image.mime.extension(),
            )?);
        }
        if let Some(source) = &step.page_source {
            attachments.push(self.write_attachment(
                "page source",
                source.text.as_bytes(),
                Mime::Text.as_str(),
                Mime::Text.extension(),
            )?);
        }
        Ok(attachments)
    }

    fn attachment_files(&self, attachment: &Attachment) -> ExtrasResult<Vec<AllureAttachment>> {
        let name = if attachment.comment.is_empty() {
            "attachment"
        } else {
            attachment.comment.as_str()
        };
        if let Some(media) = &attachment.media {
            return Ok(vec![self.write_attachment(
                name,
                &media.data,
                media.mime.as_str(),
                media.mime.extension(),
            )?]);
        }
        if let Some(source) = &attachment.source {
            let file_name = source.path.to_string_lossy();
            let ext = unknown_extension(&file_name);
            return Ok(vec![self.write_attachment(
                name,
                &source.data,
                "application/octet-stream",
                ext,
            )?]);
        }
        match (&attachment.text, attachment.mime) {
            (Some(text), Some(mime)) => Ok(vec![self.write_attachment(
                name,
                text.as_bytes(),
                mime.as_str(),
                mime.extension(),
            )?]),
            _ => Ok(Vec::new()),
        }
    }

    fn build(&self, record: &TestRecord, config: &Config) -> ExtrasResult<AllureResult> {
        let start = record.started_at.timestamp_millis();
        let stop = record.finished_at().map_or(start, |t| t.timestamp_millis());
        let outcome = record.outcome();

        let status_details = outcome
            .filter(|o| o.reason.is_some() || o.exception.is_some())
            .map(|o| StatusDetails {
                message: o
                    .exception
                    .as_ref()
                    .map(|e| format!("{}: {}", e.type_name, e.message))
                    .or_else(|| o.reason.clone()),
                trace: o.reason.clone().filter(|_| o.exception.is_some()),
            });

        let mut steps = Vec::new();
        for entry in record.entries() {
            let step = match entry {
                Entry::Step(step) => AllureStep {
                    name: step_name(&step.comment, step.position),
                    status: if step.capture_failed { "broken" } else { "passed" },
                    stage: "finished",
                    start,
                    stop: start,
                    parameters: Vec::new(),
                    attachments: self.step_attachments(step)?,
                    steps: Vec::new(),
                },
                Entry::Attachment(attachment) => AllureStep {
                    name: step_name(&attachment.comment, attachment.position),
                    status: "passed",
                    stage: "finished",
                    start,
                    stop: start,
                    parameters: Vec::new(),
                    attachments: self.attachment_files(attachment)?,
                    steps: Vec::new(),
                },
                Entry::Link(link) => AllureStep {
                    name: link.name.clone(),
                    status: "passed",
                    stage: "finished",
                    start,
                    stop: start,
                    parameters: vec![AllureParameter {
                        name: "url".to_string(),
                        value: link.url.clone(),
                    }],
                    attachments: Vec::new(),
                    steps: Vec::new(),
                },
            };
            steps.push(step);
        }

        Ok(AllureResult {
            uuid: Uuid::new_v4().to_string(),
            history_id: record.id.clone(),
            full_name: record.id.clone(),
            name: record.title.clone(),
            status: allure_status(record.status()),
            status_details,
            stage: "finished",
            description: record.description.clone(),
            start,
            stop,
            parameters: record
                .parameters
                .iter()
                .map(|(name, value)| AllureParameter {
                    name: name.clone(),
                    value: value.clone(),
                })
                .collect(),
            links: record
                .links(config)
                .into_iter()
                .map(|link| AllureLink {
                    kind: link.kind.to_string(),
                    url: link.url,
                    name: link.name,
                })
                .collect(),
            labels: vec![
                AllureLabel {
                    name: "host".to_string(),
                    value: self.host.clone(),
                },
                AllureLabel {
                    name: "framework".to_string(),
                    value: env!("CARGO_PKG_NAME").to_string(),
                },
            ],
            steps,
            attachments: Vec::new(),
        })
    }
}

fn step_name(comment: &str, position: usize) -> String {
    if comment.is_empty() {
        format!("Step {}", position + 1)
    } else {
        comment.to_string()
    }
}

impl ReportSink for AllureResults {
    fn name(&self) -> &str {
        "allure"
    }

    fn emit(&mut self, record: &TestRecord, config: &Config) -> ExtrasResult<()> {
        let result = self.build(record, config)?;
        let path = self.dir.join(format!("{}-result.json", result.uuid));
        let json = serde_json::to_string_pretty(&result)?;
        fs::write(&path, json)?;
        debug!(test = %record.id, file = %path.display(), "allure result written");
        if result.steps.iter().any(|s| s.status == "broken") {
            warn!(test = %record.id, "allure result contains steps with failed captures");
        }
        self.written.push(path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::Link;
    use crate::record::{Media, SourceFile, TestOutcome};
    use serde_json::Value;
    use tempfile::TempDir;

    #[test]
    fn test_status_mapping() {
        assert_eq!(allure_status(Status::Error), "broken");
        assert_eq!(allure_status(Status::XFailed), "skipped");
        assert_eq!(allure_status(Status::XPassed), "passed");
    }

    #[test]
    fn test_emit_writes_result_and_attachments() {
        let tmp = TempDir::new().unwrap();
        let mut sink = AllureResults::in_dir(tmp.path()).unwrap();

        let mut record = TestRecord::new("tests::checkout")
            .with_description("Checkout flow")
            .with_parameter("browser", "firefox");
        record.push(Entry::Step(Step {
            position: 0,
            comment: "cart".to_string(),
            image: Some(Media {
                mime: Mime::Png,
                uri: None,
                data: vec![1, 2, 3],
            }),
            page_source: None,
            emphasis: None,
            capture_failed: false,
        }));
        let mut attachment = Attachment::plain("log line");
        attachment.position = 1;
        record.push(Entry::Attachment(attachment));
        record.push(Entry::Link(Link::new("https://shop", None)));
        record.seal(
            TestOutcome::new(Status::Error).with_exception("TimeoutError", "page did not load"),
        );

        sink.emit(&record, &Config::defaults()).unwrap();
        assert_eq!(sink.written().len(), 1);

        let json: Value =
            serde_json::from_str(&fs::read_to_string(&sink.written()[0]).unwrap()).unwrap();
        assert_eq!(json["status"], "broken");
        assert_eq!(json["statusDetails"]["message"], "TimeoutError: page did not load");
        assert_eq!(json["parameters"][0]["value"], "firefox");
        assert_eq!(json["steps"][0]["name"], "cart");
        assert_eq!(json["steps"][1]["name"], "Step 2");
        assert_eq!(json["steps"][2]["parameters"][0]["value"], "https://shop");
        assert_eq!(json["links"][0]["type"], "link");

        let image = json["steps"][0]["attachments"][0]["source"].as_str().unwrap();
        assert!(image.ends_with("-attachment.png"));
        assert_eq!(fs::read(tmp.path().join(image)).unwrap(), vec![1, 2, 3]);
        let text = json["steps"][1]["attachments"][0]["source"].as_str().unwrap();
        assert_eq!(fs::read_to_string(tmp.path().join(text)).unwrap(), "log line");
    }

    #[test]
    fn test_source_file_uses_attached_bytes() {
        let tmp = TempDir::new().unwrap();
        let mut sink = AllureResults::in_dir(tmp.path().join("allure")).unwrap();

        let mut record = TestRecord::new("tests::export");
        record.push(Entry::Attachment(Attachment {
            comment: "export".to_string(),
            source: Some(SourceFile {
                path: tmp.path().join("gone/export.bin"),
                data: b"exported".to_vec(),
            }),
            ..Attachment::default()
        }));
        record.seal(TestOutcome::passed());

        sink.emit(&record, &Config::defaults()).unwrap();
        let json: Value =
            serde_json::from_str(&fs::read_to_string(&sink.written()[0]).unwrap()).unwrap();
        let attachment = &json["steps"][0]["attachments"][0];
        assert_eq!(attachment["type"], "application/octet-stream");
        let file = attachment["source"].as_str().unwrap();
        assert!(file.ends_with("-attachment.bin"));
        assert_eq!(fs::read(tmp.path().join("allure").join(file)).unwrap(), b"exported");
    }

    #[test]
    fn test_new_requires_dir() {
        assert!(AllureResults::new(&Config::defaults()).is_err());
    }
}
