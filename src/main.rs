use clap::{Parser, Subcommand};
use std::error::Error;
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use report_extras::session::delete_empty_subfolders;
use report_extras::{
    AllureResults, AttachmentInput, CaptureTarget, Config, DocumentKind, HtmlReport,
    LinkAnnotation, MockFramebuffer, Recorder, ReportSession, ReportSink, ScreenshotPolicy, Status,
    StepOptions, TestOutcome, TestRecord, format_document,
};

/// Report Extras - steps, screenshots and attachments for test reports
#[derive(Parser, Debug)]
#[command(
    name = "report-extras",
    about = "Format report attachments and build demo HTML / Allure reports",
    after_help = "ENVIRONMENT VARIABLES:\n\
        REPORT_EXTRAS_SCREENSHOTS         Screenshot policy: all, last, fail, none\n\
        REPORT_EXTRAS_SOURCES             Capture webpage sources (true/false)\n\
        REPORT_EXTRAS_INDENT              Indent of XML, JSON and YAML attachments\n\
        REPORT_EXTRAS_ISSUE_LINK_PATTERN  Issue link pattern, e.g. https://bugs/{}\n\
        REPORT_EXTRAS_TMS_LINK_PATTERN    Test case link pattern\n\
        REPORT_EXTRAS_LINKS_COLUMN        Links column filter: all, issue, tms, link, none\n\
        REPORT_EXTRAS_TITLE               Report title\n\
        REPORT_EXTRAS_HTML                HTML report file\n\
        REPORT_EXTRAS_SINGLE_PAGE         Self-contained HTML report (true/false)\n\
        REPORT_EXTRAS_ALLURE_DIR          Allure results directory\n\
        REPORT_EXTRAS_CSS                 User stylesheet\n\
        RUST_LOG                          Log filter (default: warn)"
)]
struct Args {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Pretty-print an XML, JSON or YAML document
    Format {
        /// Document kind: xml, json or yaml
        #[arg(short, long)]
        kind: DocumentKind,

        /// Spaces per indentation level
        #[arg(short, long, env = "REPORT_EXTRAS_INDENT", default_value = "4")]
        indent: usize,

        /// Input file (default: stdin)
        file: Option<PathBuf>,
    },

    /// Print the resolved configuration
    Config {
        /// TOML file with an [extras] table (default: environment variables)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Record a sample test against a mock page and write the reports
    Demo {
        /// HTML report file
        #[arg(long, default_value = "./report-extras-demo/report.html")]
        html: PathBuf,

        /// Allure results directory
        #[arg(long)]
        allure: Option<PathBuf>,

        /// Screenshot policy: all, last, fail, none
        #[arg(short, long, env = "REPORT_EXTRAS_SCREENSHOTS", default_value = "all")]
        screenshots: ScreenshotPolicy,

        /// Embed every asset in the HTML page
        #[arg(long)]
        single_page: bool,

        /// Outcome of the sample test
        #[arg(long, default_value = "failed")]
        status: Status,

        /// Page color as hex (e.g., "3366cc")
        #[arg(short, long, default_value = "3366cc")]
        color: String,
    },

    /// Remove empty asset folders next to an HTML report
    Clean {
        /// Report folder
        dir: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match args.command {
        Some(Commands::Format { kind, indent, file }) => {
            let text = match file {
                Some(path) => std::fs::read_to_string(path)?,
                None => {
                    let mut text = String::new();
                    std::io::stdin().read_to_string(&mut text)?;
                    text
                }
            };
            let formatted = format_document(&text, kind, indent)?;
            println!("{}", formatted.text.trim_end());
        }

        Some(Commands::Config { file }) => {
            let config = match file {
                Some(path) => Config::load(path)?,
                None => Config::from_env()?,
            };
            print_config(&config);
        }

        Some(Commands::Demo {
            html,
            allure,
            screenshots,
            single_page,
            status,
            color,
        }) => {
            let mut config = Config::from_env()?;
            config.html_report = Some(html);
            config.allure_dir = allure.or(config.allure_dir);
            config.screenshots = screenshots;
            config.single_page = single_page;
            if config.issue_link_pattern.is_none() {
                config.issue_link_pattern = Some("https://issues.example.com/browse/{}".to_string());
            }
            run_demo(config, status, parse_hex_color(&color)?)?;
        }

        Some(Commands::Clean { dir }) => {
            let removed = delete_empty_subfolders(&dir)?;
            println!("Removed {} empty folder(s) in {}", removed, dir.display());
        }

        None => {
            println!("Report Extras - steps, screenshots and attachments for test reports");
            println!();
            println!("Usage: report-extras <COMMAND>");
            println!();
            println!("Commands:");
            println!("  format  Pretty-print an XML, JSON or YAML document");
            println!("  config  Print the resolved configuration");
            println!("  demo    Record a sample test and write the reports");
            println!("  clean   Remove empty asset folders next to an HTML report");
            println!();
            println!("Run with --help for more information.");
        }
    }

    Ok(())
}

fn run_demo(config: Config, status: Status, color: [u8; 3]) -> Result<(), Box<dyn Error>> {
    let session = Arc::new(ReportSession::start(config)?);
    let mut html = HtmlReport::new(session.config())?;
    let mut allure = if session.config().allure_enabled() {
        Some(AllureResults::new(session.config())?)
    } else {
        None
    };

    let mut page = MockFramebuffer::with_color(480, 320, color).with_viewport(160);
    page.draw_text(16, 16, "Checkout", [255, 255, 255], color);
    page.draw_rect(16, 40, 200, 24, [240, 240, 240]);
    page.draw_text(24, 48, "4 items in cart", [0, 0, 0], [240, 240, 240]);
    let page: Arc<dyn CaptureTarget> =
        Arc::new(page.with_page_source("<html><body><h1>Checkout</h1></body></html>"));

    let record = TestRecord::new("demo::test_checkout")
        .with_title("test_checkout")
        .with_description("Adds items to the cart and pays.\nUses the mock storefront.")
        .with_parameter("browser", "mock")
        .with_annotation(LinkAnnotation::issues(["SHOP-42"]));
    let mut recorder = Recorder::new(Arc::clone(&session), record);

    recorder.record_step("Open the storefront", Some(Arc::clone(&page)), StepOptions::default());
    recorder.record_step(
        "Cart viewport",
        Some(Arc::clone(&page)),
        StepOptions {
            full_page: false,
            page_source: true,
            ..StepOptions::default()
        },
    );
    recorder.record_attachment(
        "Cart response",
        AttachmentInput::body(r#"{"items":4,"total":{"amount":"59.90","currency":"EUR"}}"#).mime("json"),
    )?;
    recorder.record_attachment(
        "Invoice",
        AttachmentInput::body("<invoice><line sku=\"A1\">2</line><line sku=\"B7\">2</line></invoice>").mime("xml"),
    )?;
    recorder.record_attachment(
        "Items",
        AttachmentInput::body("sku,qty\nA1,2\nB7,2").mime("csv"),
    )?;
    recorder.record_link("https://shop.example.com/cart", Some("Cart"));

    let outcome = match status {
        Status::Passed => TestOutcome::passed(),
        other => TestOutcome::new(other).with_reason("payment provider unavailable"),
    };
    let mut sinks: Vec<&mut dyn ReportSink> = Vec::new();
    sinks.push(&mut html);
    if let Some(allure) = allure.as_mut() {
        sinks.push(allure);
    }
    recorder.render(outcome, &mut sinks)?;

    let path = html.write()?;
    session.finish()?;
    info!(file = %path.display(), "demo report written");

    println!("Demo report: {}", path.display());
    println!("  Entries: {}", recorder.record().entries().len());
    println!("  Images: {}", recorder.record().image_count());
    if let Some(allure) = &allure {
        println!("  Allure results: {}", allure.dir().display());
    }
    Ok(())
}

fn print_config(config: &Config) {
    let show = |value: Option<String>| value.unwrap_or_else(|| "-".to_string());
    println!("screenshots        = {}", config.screenshots);
    println!("sources            = {}", config.sources);
    println!("indent             = {}", config.indent);
    println!("issue_link_pattern = {}", show(config.issue_link_pattern.clone()));
    println!("tms_link_pattern   = {}", show(config.tms_link_pattern.clone()));
    println!("links_column       = {}", config.links_column);
    println!("title              = {}", config.title);
    println!("html_report        = {}", show(config.html_report.as_ref().map(|p| p.display().to_string())));
    println!("single_page        = {}", config.single_page);
    println!("allure_dir         = {}", show(config.allure_dir.as_ref().map(|p| p.display().to_string())));
    println!("css                = {}", show(config.css.as_ref().map(|p| p.display().to_string())));
}

fn parse_hex_color(hex: &str) -> Result<[u8; 3], Box<dyn Error>> {
    let hex = hex.trim_start_matches('#');
    if hex.len() != 6 || !hex.is_ascii() {
        return Err("Color must be 6 hex digits (e.g., '3366cc')".into());
    }
    let r = u8::from_str_radix(&hex[0..2], 16)?;
    let g = u8::from_str_radix(&hex[2..4], 16)?;
    let b = u8::from_str_radix(&hex[4..6], 16)?;
    Ok([r, g, b])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_color() {
        assert_eq!(parse_hex_color("3366cc").unwrap(), [0x33, 0x66, 0xcc]);
        assert_eq!(parse_hex_color("#FF0000").unwrap(), [255, 0, 0]);
        assert!(parse_hex_color("36c").is_err());
        assert!(parse_hex_color("zz0000").is_err());
    }

    #[test]
    fn test_parse_hex_color_rejects_multibyte_text() {
        assert!(parse_hex_color("a\u{e9}123").is_err());
        assert!(parse_hex_color("\u{e9}\u{e9}\u{e9}").is_err());
    }
}
