//! HTML rendering
//!
//! Pages are assembled with `format!` into one shared layout. Every piece of
//! user-supplied text goes through [`escape`].

use diabetes_core::predict::PREDICTION_COLUMN;
use diabetes_core::report::{Distribution, SummaryReport, Trend};
use diabetes_core::{DiabetesLabel, DisplayTable, Feature, ManualInput, Verdict};
use std::fmt::Write;

const STYLE: &str = "
body { font-family: system-ui, sans-serif; margin: 0; color: #1f2933; }
nav { background: #243b53; padding: 0.75rem 1.5rem; }
nav a { color: #d9e2ec; margin-right: 1.25rem; text-decoration: none; }
nav a.active { color: #fff; font-weight: 600; }
main { max-width: 72rem; margin: 1.5rem auto; padding: 0 1.5rem; }
.caption { color: #627d98; font-size: 0.9rem; }
.alert { padding: 0.75rem 1rem; border-radius: 4px; margin: 1rem 0; }
.alert.error { background: #ffe3e3; color: #8a1c1c; }
.alert.success { background: #e3f9e5; color: #14532d; }
.alert.warning { background: #fff3c4; color: #7c5e10; }
form.grid { display: grid; grid-template-columns: repeat(2, minmax(12rem, 1fr)); gap: 0.75rem 1.5rem; }
form.grid label { display: flex; flex-direction: column; font-size: 0.9rem; }
table { border-collapse: collapse; margin: 1rem 0; font-size: 0.9rem; }
th, td { border: 1px solid #d9e2ec; padding: 0.35rem 0.6rem; text-align: left; }
th { background: #f0f4f8; }
td.positive { color: #8a1c1c; font-weight: 600; }
.cards { display: flex; gap: 1rem; flex-wrap: wrap; }
.card { border: 1px solid #d9e2ec; border-radius: 4px; padding: 0.75rem 1rem; min-width: 10rem; }
.card strong { display: block; font-size: 1.5rem; }
.charts { display: flex; flex-wrap: wrap; gap: 1.5rem; }
.legend span { display: inline-block; width: 0.8rem; height: 0.8rem; margin: 0 0.3rem 0 1rem; }
";

const DIABETIC_COLOR: &str = "#d64545";
const NON_DIABETIC_COLOR: &str = "#3e7cb1";

/// Escape text for HTML element and attribute content
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Navigation targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Home,
    Manual,
    Upload,
    Report,
}

impl Page {
    const ALL: [Page; 4] = [Page::Home, Page::Manual, Page::Upload, Page::Report];

    fn path(self) -> &'static str {
        match self {
            Page::Home => "/",
            Page::Manual => "/manual",
            Page::Upload => "/upload",
            Page::Report => "/report",
        }
    }

    fn title(self) -> &'static str {
        match self {
            Page::Home => "Home",
            Page::Manual => "Manual Input",
            Page::Upload => "Upload CSV",
            Page::Report => "Results Report",
        }
    }
}

fn layout(active: Page, body: &str) -> String {
    let nav: String = Page::ALL
        .iter()
        .map(|p| {
            let class = if *p == active { " class=\"active\"" } else { "" };
            format!("<a href=\"{}\"{}>{}</a>", p.path(), class, p.title())
        })
        .collect();
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
         <title>{} · Diabetes Prediction</title>\n<style>{}</style>\n</head>\n\
         <body>\n<nav>{}</nav>\n<main>\n{}\n</main>\n</body>\n</html>\n",
        active.title(),
        STYLE,
        nav,
        body
    )
}

/// Alert box severity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alert {
    Error,
    Success,
    Warning,
}

pub fn alert(kind: Alert, message: &str) -> String {
    let class = match kind {
        Alert::Error => "error",
        Alert::Success => "success",
        Alert::Warning => "warning",
    };
    format!("<div class=\"alert {}\">{}</div>", class, escape(message))
}

pub fn home_page() -> String {
    let mut inputs = String::new();
    for feature in Feature::ALL {
        let _ = write!(
            inputs,
            "<li><strong>{}</strong>: {}</li>",
            feature.label(),
            escape(feature.description())
        );
    }
    let body = format!(
        "<h1>Diabetes Risk Prediction</h1>\n\
         <p>This dashboard uses a pre-trained machine learning model to estimate the risk of \
         diabetes from clinical measurements, entered manually or uploaded as a CSV file.</p>\n\
         <p>Use the navigation bar to choose an input method.</p>\n\
         <p class=\"caption\">Predictions are informative only and are not a substitute for a \
         medical diagnosis.</p>\n<hr>\n<h2>Inputs</h2>\n<ul>{}</ul>",
        inputs
    );
    layout(Page::Home, &body)
}

fn number_input(name: &str, label: &str, value: f64, min: f64, max: Option<f64>, step: &str) -> String {
    let max = max.map(|m| format!(" max=\"{}\"", m)).unwrap_or_default();
    format!(
        "<label>{}<input type=\"number\" name=\"{}\" value=\"{}\" min=\"{}\"{} step=\"{}\" required></label>",
        label, name, value, min, max, step
    )
}

/// Manual input form, optionally followed by a verdict or an error
pub fn manual_page(input: &ManualInput, outcome: Option<Result<Verdict, String>>) -> String {
    let male_selected = if input.gender.trim().eq_ignore_ascii_case("male") {
        " selected"
    } else {
        ""
    };
    let mut fields = format!(
        "<label>Gender<select name=\"gender\"><option>Female</option>\
         <option{}>Male</option></select></label>",
        male_selected
    );
    fields.push_str(&number_input("age", "Age (years)", input.age, 1.0, Some(120.0), "1"));

    let measurements = [
        ("urea", Feature::Urea),
        ("creatinine", Feature::Creatinine),
        ("hba1c", Feature::HbA1c),
        ("cholesterol", Feature::Cholesterol),
        ("triglyceride", Feature::Triglyceride),
        ("hdl", Feature::Hdl),
        ("ldl", Feature::Ldl),
        ("vldl", Feature::Vldl),
        ("bmi", Feature::Bmi),
    ];
    for (name, feature) in measurements {
        let value = input.measurement(feature).unwrap_or_default();
        fields.push_str(&number_input(name, feature.label(), value, 0.0, None, "0.01"));
    }

    let result = match outcome {
        None => String::new(),
        Some(Ok(verdict)) => {
            let kind = if verdict.is_positive() { Alert::Error } else { Alert::Success };
            format!("<h2>Prediction</h2>{}", alert(kind, verdict.message()))
        }
        Some(Err(message)) => alert(Alert::Error, &message),
    };

    let body = format!(
        "<h1>Manual Patient Input</h1>\n\
         <form class=\"grid\" method=\"post\" action=\"/manual\">{}\
         <div><button type=\"submit\">Predict</button></div></form>\n{}",
        fields, result
    );
    layout(Page::Manual, &body)
}

/// Result of an upload, as shown under the upload form
pub enum UploadView<'a> {
    Empty,
    Scored {
        table: &'a DisplayTable,
        positive: usize,
        notice: Option<String>,
    },
    Failed(String),
}

pub fn upload_page(view: UploadView<'_>) -> String {
    let expected: Vec<&str> = Feature::ALL.iter().map(|f| f.external_name()).collect();
    let result = match view {
        UploadView::Empty => String::new(),
        UploadView::Failed(message) => alert(Alert::Error, &message),
        UploadView::Scored {
            table,
            positive,
            notice,
        } => {
            let summary = format!(
                "Prediction results: {} of {} patients predicted diabetic.",
                positive,
                table.len()
            );
            let notice = notice
                .map(|n| alert(Alert::Warning, &n))
                .unwrap_or_default();
            format!("{}{}{}", alert(Alert::Success, &summary), notice, data_table(table))
        }
    };
    let body = format!(
        "<h1>Upload CSV File</h1>\n\
         <p>Upload a <code>;</code>-separated CSV file with the columns: <code>{}</code>. \
         An optional <code>class</code> column is shown but not used for prediction.</p>\n\
         <form method=\"post\" action=\"/upload\" enctype=\"multipart/form-data\">\
         <input type=\"file\" name=\"file\" accept=\".csv,text/csv\" required> \
         <button type=\"submit\">Predict</button></form>\n{}",
        expected.join(", "),
        result
    );
    layout(Page::Upload, &body)
}

fn data_table(table: &DisplayTable) -> String {
    let prediction_idx = table.column_index(PREDICTION_COLUMN);
    let mut html = String::from("<table><thead><tr>");
    for header in &table.headers {
        let _ = write!(html, "<th>{}</th>", escape(header));
    }
    html.push_str("</tr></thead><tbody>");
    for row in &table.rows {
        html.push_str("<tr>");
        for (i, cell) in row.iter().enumerate() {
            let positive = Some(i) == prediction_idx && cell == DiabetesLabel::Diabetes.as_str();
            let class = if positive { " class=\"positive\"" } else { "" };
            let _ = write!(html, "<td{}>{}</td>", class, escape(cell));
        }
        html.push_str("</tr>");
    }
    html.push_str("</tbody></table>");
    html
}

fn fmt_mean(value: Option<f64>) -> String {
    value.map(|v| format!("{:.2}", v)).unwrap_or_else(|| "–".to_string())
}

fn histogram_svg(distribution: &Distribution) -> String {
    const WIDTH: f64 = 360.0;
    const HEIGHT: f64 = 160.0;
    const AXIS: f64 = 20.0;

    let max = distribution.max_count().max(1) as f64;
    let slot = WIDTH / distribution.bins.len() as f64;
    let bar = (slot - 4.0) / 2.0;
    let plot_height = HEIGHT - AXIS;

    let mut svg = format!(
        "<figure><figcaption>{}</figcaption>\
         <svg width=\"{}\" height=\"{}\" viewBox=\"0 0 {} {}\" role=\"img\">",
        distribution.feature.label(),
        WIDTH,
        HEIGHT,
        WIDTH,
        HEIGHT
    );
    for (i, bin) in distribution.bins.iter().enumerate() {
        let x = i as f64 * slot + 2.0;
        for (offset, count, color) in [
            (0.0, bin.diabetic, DIABETIC_COLOR),
            (bar, bin.non_diabetic, NON_DIABETIC_COLOR),
        ] {
            let h = count as f64 / max * plot_height;
            let _ = write!(
                svg,
                "<rect x=\"{:.1}\" y=\"{:.1}\" width=\"{:.1}\" height=\"{:.1}\" fill=\"{}\">\
                 <title>{:.2}–{:.2}: {}</title></rect>",
                x + offset,
                plot_height - h,
                bar,
                h,
                color,
                bin.lower,
                bin.upper,
                count
            );
        }
    }
    if let (Some(first), Some(last)) = (distribution.bins.first(), distribution.bins.last()) {
        let _ = write!(
            svg,
            "<text x=\"0\" y=\"{}\" font-size=\"11\">{:.2}</text>\
             <text x=\"{}\" y=\"{}\" font-size=\"11\" text-anchor=\"end\">{:.2}</text>",
            HEIGHT - 4.0,
            first.lower,
            WIDTH,
            HEIGHT - 4.0,
            last.upper
        );
    }
    svg.push_str("</svg></figure>");
    svg
}

pub fn report_page(report: &SummaryReport, charts: bool) -> String {
    let mut body = format!(
        "<h1>Prediction Results Report</h1>\n\
         <p class=\"caption\">Source: {} · generated {}</p>\n\
         <div class=\"cards\">\
         <div class=\"card\">Patients<strong>{}</strong></div>\
         <div class=\"card\">Predicted diabetic<strong>{}</strong></div>\
         <div class=\"card\">Predicted non-diabetic<strong>{}</strong></div>\
         <div class=\"card\">Positive rate<strong>{:.2}%</strong></div></div>\n",
        escape(&report.source),
        report.generated_at.format("%Y-%m-%d %H:%M UTC"),
        report.total,
        report.predicted_diabetic,
        report.predicted_non_diabetic,
        report.positive_rate
    );

    body.push_str(
        "<h2>Diabetes prediction by gender</h2>\
         <table><thead><tr><th>Gender</th><th>Patients</th><th>Predicted diabetic</th>\
         <th>Percent diabetic</th></tr></thead><tbody>",
    );
    for group in &report.gender {
        let _ = write!(
            body,
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{:.2}%</td></tr>",
            group.gender, group.total, group.predicted_diabetic, group.percent_diabetic
        );
    }
    body.push_str("</tbody></table>");

    body.push_str(
        "<h2>Average measurements by predicted class</h2>\
         <table><thead><tr><th>Measurement</th><th>Diabetic</th><th>Non-diabetic</th>\
         <th>Conclusion</th></tr></thead><tbody>",
    );
    for comparison in &report.features {
        let class = if comparison.trend == Trend::NoDifference {
            ""
        } else {
            " class=\"positive\""
        };
        let _ = write!(
            body,
            "<tr><td>{}</td><td>{}</td><td>{}</td><td{}>{}</td></tr>",
            comparison.feature.label(),
            fmt_mean(comparison.mean_diabetic),
            fmt_mean(comparison.mean_non_diabetic),
            class,
            escape(&comparison.conclusion)
        );
    }
    body.push_str("</tbody></table>");

    let checked = if charts { " checked" } else { "" };
    let _ = write!(
        body,
        "<form method=\"get\" action=\"/report\"><label>\
         <input type=\"checkbox\" name=\"charts\" onchange=\"this.form.submit()\"{}> \
         Show distribution charts</label><noscript> <button type=\"submit\">Apply</button>\
         </noscript></form>",
        checked
    );

    if let Some(distributions) = &report.distributions {
        let _ = write!(
            body,
            "<p class=\"legend\"><span style=\"background:{}\"></span>Diabetic\
             <span style=\"background:{}\"></span>Non-diabetic</p><div class=\"charts\">",
            DIABETIC_COLOR, NON_DIABETIC_COLOR
        );
        for distribution in distributions {
            body.push_str(&histogram_svg(distribution));
        }
        body.push_str("</div>");
    }

    layout(Page::Report, &body)
}

/// Page shown when a request fails outside a form
pub fn error_page(title: &str, message: &str) -> String {
    let body = format!("<h1>{}</h1>{}", escape(title), alert(Alert::Error, message));
    layout(Page::Home, &body)
}
