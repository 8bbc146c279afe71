use std::fs;
use std::path::PathBuf;

use agrireport::capture::{CaptureRegion, OverrideSet, DEFAULT_TARGET_ID};
use agrireport::report::{CropInputs, Prediction, ResultsView};
use agrireport::report::CHART_COLORS;
use agrireport::{Color, RasterImage, RasterOptions, Rasterizer, SoftwareRasterizer, Viewport};
use image::Rgba;

fn golden_path(name: &str) -> PathBuf {
    let mut p = PathBuf::from("tests/goldens/expected");
    p.push(name);
    p
}

fn sample_view() -> ResultsView {
    let inputs = CropInputs {
        n: 90,
        p: 42,
        k: 43,
        temperature: 20.8,
        humidity: 82.0,
        ph: 6.5,
        rainfall: 202.9,
        city: Some("Pune".into()),
    };
    let predictions = vec![
        Prediction { crop: "rice".into(), confidence: "91.20%".into() },
        Prediction { crop: "jute".into(), confidence: "6.10%".into() },
        Prediction { crop: "coffee".into(), confidence: "1.05%".into() },
    ];
    ResultsView::new(Some(inputs), predictions)
}

fn count_pixels(image: &RasterImage, color: Color) -> usize {
    let wanted = Rgba([color.r, color.g, color.b, 255]);
    image.pixels().pixels().filter(|p| **p == wanted).count()
}

#[test]
fn golden_raster_matches_fixture() {
    let html = sample_view().render_html().expect("render view");
    let region = CaptureRegion::from_html(&html, DEFAULT_TARGET_ID).expect("capture region");
    let prepared = region.prepare_clone(&OverrideSet::default());

    // No font so the digest does not depend on what is installed
    let options = RasterOptions { viewport: Viewport { width: 480 }, ..Default::default() };
    let image = SoftwareRasterizer::without_font()
        .rasterize(&prepared, region.root(), &options)
        .expect("rasterize");

    // Checked on every run, golden or not.
    assert_eq!(image.width(), 960);
    let card = Color::parse("#1e293b").unwrap();
    assert_eq!(*image.pixels().get_pixel(0, 0), Rgba([card.r, card.g, card.b, 255]));
    for hex in CHART_COLORS {
        let bar = Color::parse(hex).unwrap();
        assert!(count_pixels(&image, bar) > 0, "no {} chart bar", hex);
    }
    assert!(count_pixels(&image, Color::BLACK) > 0, "no printed text");
    assert_eq!(count_pixels(&image, Color::WHITE), 0, "white text survived the print rules");

    let digest = image.digest();

    let expected_path = golden_path("results_panel.sha256");
    if std::env::var("UPDATE_GOLDENS").is_ok() {
        fs::create_dir_all("tests/goldens/expected").ok();
        fs::write(&expected_path, &digest).expect("write golden");
        println!("Updated golden: {:?}", expected_path);
        return;
    }

    if !expected_path.exists() {
        println!(
            "No golden at {:?}; run with UPDATE_GOLDENS=1 to create it. Skipping.",
            expected_path
        );
        return;
    }

    let exp = fs::read_to_string(&expected_path).expect("unable to read golden");
    let exp_bytes = hex::decode(exp.trim()).expect("invalid hex in golden");
    assert_eq!(hex::decode(&digest).unwrap(), exp_bytes);
}

#[test]
fn print_rules_change_the_raster() {
    let html = sample_view().render_html().unwrap();
    let region = CaptureRegion::from_html(&html, DEFAULT_TARGET_ID).unwrap();
    let options = RasterOptions { viewport: Viewport { width: 480 }, ..Default::default() };
    let r = SoftwareRasterizer::without_font();

    let screen = r.rasterize(region.tree(), region.root(), &options).unwrap();
    let print = r
        .rasterize(&region.prepare_clone(&OverrideSet::default()), region.root(), &options)
        .unwrap();
    // Hidden tip and button take no space in the printed clone.
    assert!(print.height() < screen.height());
    assert_eq!(print.width(), screen.width());
    assert!(count_pixels(&screen, Color::WHITE) > 0);
    assert_eq!(count_pixels(&print, Color::WHITE), 0);
}
