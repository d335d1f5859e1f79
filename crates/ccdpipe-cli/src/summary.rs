use console::Style;
use ccdpipe_core::index::NightSummary;
use ccdpipe_core::pipeline::config::PipelineConfig;
use ccdpipe_core::pipeline::{AlignCombineReport, ReductionReport};

struct Styles {
    title: Style,
    header: Style,
    label: Style,
    value: Style,
    method: Style,
    disabled: Style,
    path: Style,
}

impl Styles {
    fn new() -> Self {
        Self {
            title: Style::new().cyan().bold(),
            header: Style::new().cyan().bold(),
            label: Style::new().dim(),
            value: Style::new().bold().white(),
            method: Style::new().green(),
            disabled: Style::new().dim().yellow(),
            path: Style::new().underlined(),
        }
    }
}

fn print_title(s: &Styles, title: &str) {
    println!();
    println!("  {}", s.title.apply_to(title));
    println!("  {}", s.title.apply_to("\u{2550}".repeat(title.chars().count())));
    println!();
}

pub fn print_night_summary(summary: &NightSummary) {
    let s = Styles::new();
    print_title(&s, &format!("Night {}", summary.night));

    for (label, n) in [
        ("Total", summary.total),
        ("Calibration", summary.calibration),
        ("Science", summary.science),
        ("Others", summary.others),
        ("Bias", summary.bias),
    ] {
        println!("  {:<14}{}", s.label.apply_to(label), s.value.apply_to(n));
    }
    println!();

    if !summary.flats.is_empty() {
        println!("  {}", s.header.apply_to("Flats"));
        for (filter, n) in &summary.flats {
            println!("    {:<12}{}", s.label.apply_to(filter), s.value.apply_to(n));
        }
        println!();
    }

    if !summary.objects.is_empty() {
        println!("  {}", s.header.apply_to("Objects"));
        for (object, o) in &summary.objects {
            let filters = o
                .per_filter
                .iter()
                .map(|(f, n)| format!("{f}:{n}"))
                .collect::<Vec<_>>()
                .join(" ");
            let exposures = o.exposures.iter().cloned().collect::<Vec<_>>().join(", ");
            println!(
                "    {:<12}{} frames  {}  [{}]s  X {:.2}-{:.2}",
                s.label.apply_to(object),
                s.value.apply_to(o.frames),
                s.method.apply_to(filters),
                exposures,
                o.airmass_min,
                o.airmass_max
            );
        }
        println!();
    }
}

pub fn print_reduction_plan(config: &PipelineConfig) {
    let s = Styles::new();
    print_title(&s, "Initial Reduction");

    let reduction = &config.reduction;
    println!(
        "  {:<14}{}",
        s.label.apply_to("Master bias"),
        s.method.apply_to(&reduction.bias_method)
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Master flat"),
        s.method.apply_to(&reduction.flat.combine)
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Flat scaling"),
        s.value.apply_to(format!("{:?}", reduction.flat.scaling))
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Normalize"),
        s.value.apply_to(format!("{:?}", reduction.flat.normalization))
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Sort by"),
        s.value.apply_to(reduction.organize_keys.join(" / "))
    );
    if reduction.cleanup_calibration {
        println!(
            "  {:<14}{}",
            s.label.apply_to("Cleanup"),
            s.value.apply_to("raw calibration copies")
        );
    } else {
        println!(
            "  {:<14}{}",
            s.label.apply_to("Cleanup"),
            s.disabled.apply_to("disabled")
        );
    }
    println!();
}

pub fn print_reduction_report(report: &ReductionReport) {
    let s = Styles::new();
    print_title(&s, "Reduction Complete");

    println!(
        "  {:<14}{}",
        s.label.apply_to("Root"),
        s.path.apply_to(report.root.display())
    );
    println!(
        "  {:<14}{} bias, {} flat, {} science, {} other",
        s.label.apply_to("Frames"),
        s.value.apply_to(report.bias_frames),
        s.value.apply_to(report.flat_frames),
        s.value.apply_to(report.science_frames),
        s.value.apply_to(report.other_frames)
    );
    if let Some(ref bias) = report.master_bias {
        println!(
            "  {:<14}{}",
            s.label.apply_to("Master bias"),
            s.path.apply_to(bias.display())
        );
    }
    for (filter, path) in &report.master_flats {
        println!(
            "  {:<14}{}",
            s.label.apply_to(format!("Flat {filter}")),
            s.path.apply_to(path.display())
        );
    }
    println!(
        "  {:<14}{} ({} already calibrated)",
        s.label.apply_to("Calibrated"),
        s.value.apply_to(report.calibrated),
        report.already_calibrated
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Overscan"),
        s.value.apply_to(report.overscan_corrected)
    );
    println!();

    if !report.science_dirs.is_empty() {
        println!("  {}", s.header.apply_to("Science folders"));
        for dir in &report.science_dirs {
            println!("    {}", s.path.apply_to(dir.display()));
        }
        println!();
    }
}

pub fn print_align_combine_report(report: &AlignCombineReport) {
    let s = Styles::new();
    print_title(&s, "Align & Combine");

    println!(
        "  {:<14}{}",
        s.label.apply_to("Aligned"),
        s.value.apply_to(report.aligned)
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Skipped"),
        s.value.apply_to(report.skipped)
    );
    println!("  {}", s.header.apply_to("Combined"));
    for path in &report.combined {
        println!("    {}", s.path.apply_to(path.display()));
    }
    println!();
}
