use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Local;
use maud::{html, Markup, PreEscaped, DOCTYPE};
use plotly::Plot;

const PLOTLY_CDN: &str = "https://cdn.plot.ly/plotly-2.35.2.min.js";

/// Titled block of HTML fragments and figures.
#[derive(Debug, Clone)]
pub struct ReportSection {
    title: String,
    blocks: Vec<Markup>,
    n_plots: usize,
}

impl ReportSection {
    pub fn new(title: &str) -> Self {
        ReportSection {
            title: title.to_string(),
            blocks: Vec::new(),
            n_plots: 0,
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn add_content(&mut self, content: Markup) {
        self.blocks.push(content);
    }

    pub fn add_plot(&mut self, plot: Plot) {
        let id = format!("{}-plot-{}", slug(&self.title), self.n_plots);
        self.n_plots += 1;
        self.blocks.push(PreEscaped(plot.to_inline_html(Some(id.as_str()))));
    }

    fn render(&self) -> Markup {
        html! {
            section id=(slug(&self.title)) {
                h2 { (self.title) }
                @for block in &self.blocks {
                    div class="block" { (block) }
                }
            }
        }
    }
}

/// Single-page HTML report.
#[derive(Debug, Clone)]
pub struct Report {
    name: String,
    version: String,
    logo: Option<String>,
    title: String,
    sections: Vec<ReportSection>,
}

impl Report {
    pub fn new(name: &str, version: &str, logo: Option<&str>, title: &str) -> Self {
        Report {
            name: name.to_string(),
            version: version.to_string(),
            logo: logo.map(str::to_string),
            title: title.to_string(),
            sections: Vec::new(),
        }
    }

    pub fn add_section(&mut self, section: ReportSection) {
        self.sections.push(section);
    }

    pub fn sections(&self) -> &[ReportSection] {
        &self.sections
    }

    pub fn render(&self) -> Markup {
        let generated = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        html! {
            (DOCTYPE)
            html lang="en" {
                head {
                    meta charset="utf-8";
                    title { (self.title) }
                    script src=(PLOTLY_CDN) {}
                    style {
                        "body { font-family: sans-serif; margin: 2em auto; max-width: 1100px; }
                         table { border-collapse: collapse; }
                         td, th { border: 1px solid #ccc; padding: 4px 8px; text-align: right; }
                         nav a { margin-right: 1em; }"
                    }
                }
                body {
                    header {
                        @if let Some(logo) = &self.logo {
                            img src=(logo) alt=(self.name) height="60";
                        }
                        h1 { (self.title) }
                        p { (self.name) " " (self.version) " | generated " (generated) }
                        nav {
                            @for section in &self.sections {
                                a href=(format!("#{}", slug(section.title()))) { (section.title()) }
                            }
                        }
                    }
                    @for section in &self.sections {
                        (section.render())
                    }
                }
            }
        }
    }

    pub fn to_html(&self) -> String {
        self.render().into_string()
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        fs::write(path, self.to_html())
            .with_context(|| format!("Failed to write report: {}", path.display()))?;
        log::info!("report written to {}", path.display());
        Ok(())
    }
}

fn slug(title: &str) -> String {
    title
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use plotly::Scatter;

    #[test]
    fn report_contains_sections_and_plots() {
        let mut section = ReportSection::new("Feature Importance");
        section.add_content(html! { p { "hello" } });
        let mut plot = Plot::new();
        plot.add_trace(Scatter::new(vec![1, 2], vec![3, 4]));
        section.add_plot(plot);

        let mut report = Report::new("survey-subsample", "0.1.0", None, "Run report");
        report.add_section(section);
        let html = report.to_html();
        assert!(html.contains("<h2>Feature Importance</h2>"));
        assert!(html.contains("feature-importance-plot-0"));
        assert!(html.contains("href=\"#feature-importance\""));
        assert!(html.contains("hello"));
    }
}
