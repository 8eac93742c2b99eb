// Colored terminal output for analysis reports and domain metrics.
//
// This module handles all terminal-specific formatting. The main.rs
// commands delegate here.

use colored::Colorize;

use super::report::AnalysisReport;
use crate::scoring::authority::Grade;
use crate::scoring::domain::DomainStructure;
use crate::scoring::metrics::DomainMetrics;

/// Display a full analysis report in the terminal.
pub fn display_report(report: &AnalysisReport) {
    let score = &report.authority;

    println!(
        "\n{}",
        format!("=== Topical Authority: {} ===", report.domain).bold()
    );
    println!();
    println!(
        "  Score: {}  Grade: {}",
        format!("{:.2}/100", score.final_score).bold(),
        colorize_grade(score.grade)
    );
    println!("  {}", score.interpretation.dimmed());
    display_domain_structure(&report.domain_structure);
    println!();

    println!("  {}", "Components".dimmed());
    println!("  {}", "-".repeat(44).dimmed());
    println!("  {:<24} {:>8.2}", "Semantic relevance", score.semantic_relevance);
    println!("  {:<24} {:>8.2}", "Topical consistency", score.topical_consistency);
    println!("  {:<24} {:>8.2}", "Backlink quality", score.backlink_quality);
    println!("  {:<24} {:>8.2}", "Domain age bonus", score.domain_age_bonus);

    let stats = &report.stats;
    println!();
    println!(
        "  Documents: {} analyzed, {} dropped  |  Topics: {}  |  Outliers: {}",
        stats.total_documents, stats.dropped_documents, stats.total_topics, stats.outliers
    );
    if let Some(fallback) = stats.fallback {
        println!("  {} clustering fallback: {}", "~".yellow(), fallback);
    }

    if !report.topics.is_empty() {
        println!("\n{}", format!("=== Topics ({}) ===", report.topics.len()).bold());
        for topic in &report.topics {
            let keywords: Vec<&str> = topic
                .keywords
                .iter()
                .take(5)
                .map(|k| k.phrase.as_str())
                .collect();
            println!(
                "\n  {} {} ({} pages)",
                "Topic".bold(),
                topic.topic_id,
                topic.size
            );
            if !keywords.is_empty() {
                println!("    Keywords: {}", keywords.join(", ").cyan());
            }
            if !topic.representative_terms.is_empty() {
                println!("    Terms:    {}", topic.representative_terms.join(", ").dimmed());
            }
            for url in &topic.sample_urls {
                println!("    {}", url.dimmed());
            }
            if !topic.representative_text.is_empty() {
                let preview = super::truncate_chars(&topic.representative_text, 120);
                println!("    \"{}\"", preview.dimmed());
            }
        }
    }

    if !score.warnings.is_empty() {
        println!();
        for warning in &score.warnings {
            println!("  {} {}", "!".yellow(), warning);
        }
    }

    if !report.recommendations.is_empty() {
        println!("\n{}", "=== Recommendations ===".bold());
        for rec in &report.recommendations {
            println!("  - {}", rec);
        }
    }
    println!();
}

/// One line summarizing how the host splits and what kind of TLD it uses.
fn display_domain_structure(structure: &DomainStructure) {
    let subdomain = if structure.is_subdomain {
        format!("subdomain {}", structure.subdomain)
    } else {
        "apex domain".to_string()
    };
    println!(
        "  {}",
        format!(
            "Registrable: {} ({}, {} TLD)",
            structure.registrable_domain(),
            subdomain,
            structure.tld_category
        )
        .dimmed()
    );
}

/// Display raw domain metrics (the `metrics` command).
pub fn display_domain_metrics(domain: &str, structure: &DomainStructure, metrics: Option<&DomainMetrics>) {
    println!("\n{}", format!("=== Domain metrics: {} ===", domain).bold());
    display_domain_structure(structure);

    let Some(m) = metrics else {
        println!("  {}", "No metrics available".yellow());
        return;
    };

    fn show<T: std::fmt::Display>(label: &str, value: Option<T>) {
        match value {
            Some(v) => println!("  {:<24} {}", label, v),
            None => println!("  {:<24} {}", label, "n/a".dimmed()),
        }
    }

    show("Domain authority", m.domain_authority);
    show("Page authority", m.page_authority);
    show("Spam score", m.spam_score.map(|s| format!("{s}%")));
    show("Root domains linking", m.root_domains_linking);
    show("External links", m.external_links);
    show("Domain age (years)", m.domain_age_years);
}

/// Colorize a letter grade.
fn colorize_grade(grade: Grade) -> colored::ColoredString {
    match grade {
        Grade::APlus | Grade::A => grade.as_str().green().bold(),
        Grade::B => grade.as_str().green(),
        Grade::C => grade.as_str().yellow(),
        Grade::D => grade.as_str().bright_red(),
        Grade::F => grade.as_str().red().bold(),
    }
}
