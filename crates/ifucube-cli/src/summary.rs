use std::path::PathBuf;

use console::Style;
use ifucube_core::pipeline::{CoaddConfig, CoaddOutput};

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

fn auto(value: Option<f64>, unit: &str) -> String {
    value.map_or_else(|| "native".to_string(), |v| format!("{v} {unit}"))
}

pub fn print_coadd_summary(config: &CoaddConfig, inputs: &[PathBuf]) {
    let s = Styles::new();

    println!();
    println!("  {}", s.title.apply_to("IFU Datacube"));
    println!("  {}", s.title.apply_to("\u{2550}".repeat(12)));
    println!();

    println!("  {}", s.header.apply_to("Inputs"));
    for (i, path) in inputs.iter().enumerate() {
        println!("    {}. {}", s.label.apply_to(i + 1), s.path.apply_to(path.display()));
    }
    println!();

    let output = if config.output.as_os_str().is_empty() {
        "from input names".to_string()
    } else {
        config.output.display().to_string()
    };
    println!("  {:<14}{}", s.label.apply_to("Output"), s.path.apply_to(output));
    println!(
        "  {:<14}{}",
        s.label.apply_to("Mode"),
        s.method.apply_to(if config.combine { "combined" } else { "one cube per frame" })
    );
    println!();

    println!("  {}", s.header.apply_to("Grid"));
    println!(
        "    {:<12}{}",
        s.label.apply_to("Spaxel"),
        s.value.apply_to(auto(config.spatial_scale, "arcsec"))
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Wave step"),
        s.value.apply_to(auto(config.wave_delta, "A"))
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Subpixels"),
        s.value.apply_to(format!("{}x{}", config.spec_subpixel, config.spat_subpixel))
    );
    if let Some(ref reference) = config.reference_image {
        println!(
            "    {:<12}{}",
            s.label.apply_to("Reference"),
            s.path.apply_to(reference.display())
        );
    }
    println!();

    if config.combine && inputs.len() > 1 {
        println!("  {}", s.header.apply_to("Weighting"));
        println!(
            "    {:<12}{}",
            s.label.apply_to("Method"),
            s.method.apply_to(if config.relative_weights {
                "relative S/N"
            } else {
                "wavelength dependent S/N"
            })
        );
        println!(
            "    {:<12}{}",
            s.label.apply_to("Whitelight"),
            s.value.apply_to(config.whitelight_range)
        );
        println!();
    }

    if config.debug {
        println!("  {:<14}{}", s.header.apply_to("Residuals"), s.method.apply_to("enabled"));
    } else {
        println!("  {:<14}{}", s.header.apply_to("Residuals"), s.disabled.apply_to("disabled"));
    }
    println!();
}

pub fn print_outputs(outputs: &[CoaddOutput]) {
    let s = Styles::new();

    println!();
    for out in outputs {
        let (nx, ny, nwave) = out.shape;
        println!("  {:<14}{}", s.label.apply_to("Cube"), s.path.apply_to(out.cube.display()));
        println!(
            "    {:<12}{}",
            s.label.apply_to("Shape"),
            s.value.apply_to(format!("{nx}x{ny}x{nwave}"))
        );
        println!(
            "    {:<12}{}",
            s.label.apply_to("Frames"),
            s.value.apply_to(out.frames)
        );
        println!(
            "    {:<12}{}",
            s.label.apply_to("Empty"),
            s.value.apply_to(format!("{} voxels", out.empty_voxels))
        );
        if let Some(ref path) = out.whitelight {
            println!("    {:<12}{}", s.label.apply_to("Whitelight"), s.path.apply_to(path.display()));
        }
        if let Some(ref path) = out.residual {
            println!("    {:<12}{}", s.label.apply_to("Residuals"), s.path.apply_to(path.display()));
        }
    }
    println!();
}
