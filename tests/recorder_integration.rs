//! Integration tests for recording and rendering whole tests

use std::fs;
use std::sync::Arc;

use serde_json::{Value, json};
use tempfile::TempDir;

use report_extras::{
    AllureResults, AttachmentInput, CaptureTarget, Config, Entry, ExtrasError, HtmlReport,
    LinkAnnotation, MockFramebuffer, RecordState, Recorder, ReportSession, ReportSink,
    ScreenshotPolicy, Status, StepOptions, TestOutcome, TestRecord,
};

fn page() -> Arc<dyn CaptureTarget> {
    let mut fb = MockFramebuffer::with_color(64, 48, [20, 40, 60]);
    fb.draw_text(4, 4, "page", [255, 255, 255], [20, 40, 60]);
    Arc::new(fb.with_page_source("<html><body>page</body></html>"))
}

fn setup(tmp: &TempDir, policy: ScreenshotPolicy) -> (Arc<ReportSession>, HtmlReport) {
    let config = Config::builder()
        .html_report(tmp.path().join("report.html"))
        .screenshots(policy)
        .build()
        .expect("valid config");
    let session = Arc::new(ReportSession::start(config).expect("session starts"));
    let report = HtmlReport::new(session.config()).expect("html report");
    (session, report)
}

fn count_images(html: &str) -> usize {
    html.matches("class=\"extras_image\"").count()
}

#[test]
fn test_rendered_output_preserves_call_order() {
    let tmp = TempDir::new().unwrap();
    let (session, mut report) = setup(&tmp, ScreenshotPolicy::All);
    let mut rec = Recorder::new(Arc::clone(&session), TestRecord::new("it::order"));

    rec.record_step("first-step", Some(page()), StepOptions::default());
    rec.record_attachment("second-attachment", AttachmentInput::body("plain body"))
        .unwrap();
    rec.record_link("https://third.example.com", Some("third-link"));
    rec.record_step("fourth-step", None, StepOptions::default());
    rec.render(TestOutcome::passed(), &mut [&mut report]).unwrap();

    let html = report.to_html();
    let steps = &html[html.find("<table style=\"width: 100%;\">").expect("steps table")..];
    let positions: Vec<usize> = ["first-step", "second-attachment", "third-link", "fourth-step"]
        .iter()
        .map(|marker| steps.find(marker).unwrap_or_else(|| panic!("{} missing", marker)))
        .collect();
    let mut sorted = positions.clone();
    sorted.sort();
    assert_eq!(positions, sorted);
}

#[test]
fn test_step_without_target_has_no_image() {
    let tmp = TempDir::new().unwrap();
    let (session, mut report) = setup(&tmp, ScreenshotPolicy::All);
    let mut rec = Recorder::new(session, TestRecord::new("it::no_target"));

    rec.record_step("just a comment", None, StepOptions::default());
    rec.render(TestOutcome::passed(), &mut [&mut report]).unwrap();

    assert_eq!(rec.record().image_count(), 0);
    assert_eq!(count_images(&report.to_html()), 0);
}

#[test]
fn test_policy_none_yields_no_images() {
    let tmp = TempDir::new().unwrap();
    let (session, mut report) = setup(&tmp, ScreenshotPolicy::None);
    let mut rec = Recorder::new(Arc::clone(&session), TestRecord::new("it::none"));

    for i in 0..5 {
        rec.record_step(&format!("step {}", i), Some(page()), StepOptions::default());
    }
    rec.render(TestOutcome::failed("boom"), &mut [&mut report]).unwrap();

    assert_eq!(rec.record().image_count(), 0);
    assert_eq!(count_images(&report.to_html()), 0);
    assert_eq!(session.list_assets("screenshots").unwrap().len(), 1);
}

#[test]
fn test_policy_last_yields_one_image() {
    let tmp = TempDir::new().unwrap();
    let (session, mut report) = setup(&tmp, ScreenshotPolicy::Last);
    let mut rec = Recorder::new(session, TestRecord::new("it::last"));

    for i in 0..3 {
        rec.record_step(&format!("step {}", i), Some(page()), StepOptions::default());
    }
    rec.render(TestOutcome::passed(), &mut [&mut report]).unwrap();

    assert_eq!(rec.record().image_count(), 1);
    assert_eq!(count_images(&report.to_html()), 1);
    let Some(Entry::Step(last)) = rec.record().entries().last() else {
        panic!("teardown step missing");
    };
    assert_eq!(last.comment, "Last screenshot");
    assert!(last.image.is_some());
}

#[test]
fn test_policy_all_adds_failure_screenshot() {
    let tmp = TempDir::new().unwrap();
    let (session, mut report) = setup(&tmp, ScreenshotPolicy::All);
    let mut rec = Recorder::new(session, TestRecord::new("it::all"));

    rec.record_step("step", Some(page()), StepOptions::default());
    rec.render(TestOutcome::new(Status::Skipped), &mut [&mut report]).unwrap();

    assert_eq!(rec.record().image_count(), 2);
    let html = report.to_html();
    assert!(html.contains("Last screenshot before skip"));
    assert!(html.contains("extras_color_skipped"));
}

#[test]
fn test_body_and_source_is_invalid_argument() {
    let tmp = TempDir::new().unwrap();
    let (session, _) = setup(&tmp, ScreenshotPolicy::All);
    let mut rec = Recorder::new(session, TestRecord::new("it::both"));

    let input = AttachmentInput::body("inline").with_source(tmp.path().join("file.txt"));
    let result = rec.record_attachment("both", input);
    assert!(matches!(result, Err(ExtrasError::InvalidArgument(_))));
    assert!(rec.record().entries().is_empty());
}

#[test]
fn test_json_attachment_is_indented() {
    let tmp = TempDir::new().unwrap();
    let config = Config::builder()
        .html_report(tmp.path().join("report.html"))
        .indent(2)
        .build()
        .unwrap();
    let session = Arc::new(ReportSession::start(config).unwrap());
    let mut report = HtmlReport::new(session.config()).unwrap();
    let mut rec = Recorder::new(session, TestRecord::new("it::json"));

    rec.record_attachment("payload", AttachmentInput::body(json!({"a": 1})).mime("json"))
        .unwrap();
    rec.render(TestOutcome::passed(), &mut [&mut report]).unwrap();

    let html = report.to_html();
    assert!(html.contains("<pre class=\"extras_pre\">{\n  \"a\": 1\n}</pre>"));
}

#[test]
fn test_screenshots_are_written_to_disk() {
    let tmp = TempDir::new().unwrap();
    let (session, mut report) = setup(&tmp, ScreenshotPolicy::All);
    let mut rec = Recorder::new(Arc::clone(&session), TestRecord::new("it::files"));

    let options = StepOptions {
        page_source: true,
        ..StepOptions::default()
    };
    rec.record_step("with source", Some(page()), options);
    rec.render(TestOutcome::passed(), &mut [&mut report]).unwrap();
    report.write().unwrap();

    let images = session.list_assets("screenshots").unwrap();
    assert_eq!(images.len(), 2, "placeholder plus one screenshot");
    let sources = session.list_assets("sources").unwrap();
    assert_eq!(fs::read_to_string(&sources[0]).unwrap(), "<html><body>page</body></html>");

    let html = fs::read_to_string(tmp.path().join("report.html")).unwrap();
    assert!(html.contains("[page source]"));
    assert!(html.contains("href=\"screenshots/image-"));

    assert_eq!(session.finish().unwrap(), 1);
    assert!(!tmp.path().join("downloads").exists());
}

#[test]
fn test_single_page_embeds_images() {
    let tmp = TempDir::new().unwrap();
    let config = Config::builder()
        .html_report(tmp.path().join("report.html"))
        .single_page(true)
        .build()
        .unwrap();
    let session = Arc::new(ReportSession::start(config).unwrap());
    let mut report = HtmlReport::new(session.config()).unwrap();
    let mut rec = Recorder::new(session, TestRecord::new("it::single"));

    rec.record_step("embedded", Some(page()), StepOptions::default());
    rec.render(TestOutcome::passed(), &mut [&mut report]).unwrap();

    let html = report.to_html();
    assert!(html.contains("<img src=\"data:image/png;base64,"));
    assert!(!tmp.path().join("screenshots").exists());
}

#[test]
fn test_allure_and_html_sinks_together() {
    let tmp = TempDir::new().unwrap();
    let config = Config::builder()
        .html_report(tmp.path().join("html/report.html"))
        .allure_dir(tmp.path().join("allure"))
        .tms_link_pattern("https://tms.example.com/{}")
        .build()
        .unwrap();
    let session = Arc::new(ReportSession::start(config).unwrap());
    let mut html = HtmlReport::new(session.config()).unwrap();
    let mut allure = AllureResults::new(session.config()).unwrap();

    let record = TestRecord::new("it::sinks").with_annotation(LinkAnnotation::tms(["TC-7"]));
    let mut rec = Recorder::new(session, record);
    rec.record_step("shot", Some(page()), StepOptions::default());
    rec.record_attachment("yaml", AttachmentInput::body("a: [1, 2]").mime("yaml"))
        .unwrap();

    let mut sinks: [&mut dyn ReportSink; 2] = [&mut html, &mut allure];
    rec.render(TestOutcome::failed("assertion failed"), &mut sinks).unwrap();

    assert!(html.to_html().contains("https://tms.example.com/TC-7"));
    let result: Value =
        serde_json::from_str(&fs::read_to_string(&allure.written()[0]).unwrap()).unwrap();
    assert_eq!(result["status"], "failed");
    assert_eq!(result["links"][0]["type"], "tms");
    assert_eq!(result["steps"].as_array().unwrap().len(), 3);
    assert_eq!(result["steps"][2]["name"], "Last screenshot before failure");
}

#[test]
fn test_source_file_removed_before_render() {
    let tmp = TempDir::new().unwrap();
    let config = Config::builder()
        .html_report(tmp.path().join("html/report.html"))
        .allure_dir(tmp.path().join("allure"))
        .build()
        .unwrap();
    let session = Arc::new(ReportSession::start(config).unwrap());
    let mut html = HtmlReport::new(session.config()).unwrap();
    let mut allure = AllureResults::new(session.config()).unwrap();
    let mut rec = Recorder::new(session, TestRecord::new("it::scratch"));

    let scratch = TempDir::new().unwrap();
    let file = scratch.path().join("run.log");
    fs::write(&file, "line one\nline two\n").unwrap();
    rec.record_attachment("log", AttachmentInput::source(&file)).unwrap();
    drop(scratch);
    assert!(!file.exists());

    let mut sinks: [&mut dyn ReportSink; 2] = [&mut html, &mut allure];
    rec.render(TestOutcome::passed(), &mut sinks).unwrap();

    assert_eq!(rec.record().state(), RecordState::Flushed);
    assert_eq!(allure.written().len(), 1);
    let result: Value =
        serde_json::from_str(&fs::read_to_string(&allure.written()[0]).unwrap()).unwrap();
    let source = result["steps"][0]["attachments"][0]["source"].as_str().unwrap();
    assert_eq!(
        fs::read_to_string(tmp.path().join("allure").join(source)).unwrap(),
        "line one\nline two\n"
    );
    assert!(html.to_html().contains(">run.log</a>"));
}
