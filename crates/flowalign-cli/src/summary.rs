use console::Style;
use flowalign_core::align::AlignmentResult;
use flowalign_core::pipeline::config::AlignConfig;

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

pub fn print_align_summary(config: &AlignConfig) {
    let s = Styles::new();

    println!();
    println!("  {}", s.title.apply_to("Flow Alignment"));
    println!("  {}", s.title.apply_to("\u{2550}".repeat(14)));
    println!();

    println!(
        "  {:<14}{}",
        s.label.apply_to("Input"),
        s.path.apply_to(config.input.display())
    );
    print_optional_path(&s, "Composite", config.composite.as_deref());
    print_optional_path(&s, "Aligned", config.aligned_movie.as_deref());
    print_optional_path(&s, "Records", config.records.as_deref());
    println!(
        "  {:<14}{}",
        s.label.apply_to("Device"),
        s.method.apply_to(config.device)
    );
    println!();

    println!("  {}", s.header.apply_to("Frames"));
    match config.frame_range {
        Some(range) => println!(
            "    {:<12}{}",
            s.label.apply_to("Range"),
            s.value.apply_to(format!("{}-{}", range.first, range.last))
        ),
        None => println!(
            "    {:<12}{}",
            s.label.apply_to("Range"),
            s.disabled.apply_to("all")
        ),
    }
    match config.crop {
        Some(crop) => println!(
            "    {:<12}{}",
            s.label.apply_to("Crop"),
            s.value.apply_to(format!(
                "({},{})-({},{})",
                crop.top_left.0, crop.top_left.1, crop.bottom_right.0, crop.bottom_right.1
            ))
        ),
        None => println!(
            "    {:<12}{}",
            s.label.apply_to("Crop"),
            s.disabled.apply_to("none")
        ),
    }
    println!(
        "    {:<12}{}",
        s.label.apply_to("Dark"),
        flag(&s, config.dark.is_some())
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Gain"),
        flag(&s, config.gain.is_some())
    );
    println!();

    println!("  {}", s.header.apply_to("Flow"));
    println!(
        "    {:<12}{}",
        s.label.apply_to("Window"),
        s.value.apply_to(format!("{} px", config.flow.window_size))
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Levels"),
        s.value.apply_to(config.flow.levels)
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Group size"),
        s.value.apply_to(config.group_size)
    );
    println!();
}

pub fn print_result_summary(config: &AlignConfig, result: &AlignmentResult) {
    let s = Styles::new();

    println!();
    println!("  {}", s.header.apply_to("Levels"));
    for level in &result.levels {
        println!(
            "    {:<12}{}",
            s.label.apply_to(format!("Level {}", level.level_index)),
            s.value.apply_to(format!(
                "{} groups of {} frame(s), {:.2}s",
                level.group_count,
                level.group_size,
                level.elapsed.as_secs_f64()
            ))
        );
    }
    if let Some(worst) = result
        .records
        .iter()
        .max_by(|a, b| a.mean_abs_x.hypot(a.mean_abs_y).total_cmp(&b.mean_abs_x.hypot(b.mean_abs_y)))
    {
        println!(
            "    {:<12}{}",
            s.label.apply_to("Worst step"),
            s.value.apply_to(format!(
                "frame {} ({:.3}, {:.3}) px",
                worst.frame, worst.mean_abs_x, worst.mean_abs_y
            ))
        );
    }
    println!();

    if let Some(ref path) = config.composite {
        println!(
            "  {:<14}{}",
            s.label.apply_to("Saved"),
            s.path.apply_to(path.display())
        );
    }
}

fn print_optional_path(s: &Styles, label: &str, path: Option<&std::path::Path>) {
    match path {
        Some(p) => println!("  {:<14}{}", s.label.apply_to(label), s.path.apply_to(p.display())),
        None => println!("  {:<14}{}", s.label.apply_to(label), s.disabled.apply_to("not written")),
    }
}

fn flag(s: &Styles, on: bool) -> console::StyledObject<&'static str> {
    if on {
        s.method.apply_to("applied")
    } else {
        s.disabled.apply_to("none")
    }
}
