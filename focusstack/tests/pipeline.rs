//! End-to-end pipeline runs against real files on disk.

use focusstack::pipeline::{run_stack, StackOptions};
use focusstack::tasks::MEMORY_SENTINEL;
use focusstack::{Logger, NoOpLogger};
use image::{DynamicImage, Rgb, RgbImage};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

fn logger() -> Arc<dyn Logger> {
    Arc::new(NoOpLogger)
}

fn frame(width: u32, height: u32, shade: u8) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        Rgb([shade, (x % 256) as u8, (y % 256) as u8])
    }))
}

/// Writes three stack frames at a size that forces wavelet padding
/// (1000x700 expands to 1000x704 at 3 levels).
fn write_stack(dir: &std::path::Path) -> Vec<PathBuf> {
    (0..3)
        .map(|i| {
            let path = dir.join(format!("frame{i}.png"));
            frame(1000, 700, 40 * (i as u8 + 1)).save(&path).unwrap();
            path
        })
        .collect()
}

#[test]
fn stacks_to_an_output_file() {
    let dir = tempfile::tempdir().unwrap();
    let inputs = write_stack(dir.path());
    let output = dir.path().join("stacked.png");

    let report = run_stack(
        &StackOptions {
            inputs,
            output: output.to_string_lossy().into_owned(),
            threads: 2,
            ..StackOptions::default()
        },
        &logger(),
    )
    .unwrap();

    // 3 loads + merge + save.
    assert_eq!(report.tasks, 5);

    // The padding added for the wavelet transform never reaches the file;
    // the content is the reference (middle) frame.
    let written = image::open(&output).unwrap();
    assert_eq!((written.width(), written.height()), (1000, 700));
    assert_eq!(written.to_rgb8(), frame(1000, 700, 80).to_rgb8());
}

#[test]
fn sentinel_output_stays_in_memory() {
    let dir = tempfile::tempdir().unwrap();
    let inputs = write_stack(dir.path());

    let report = run_stack(
        &StackOptions {
            inputs,
            output: MEMORY_SENTINEL.to_string(),
            threads: 2,
            ..StackOptions::default()
        },
        &logger(),
    )
    .unwrap();

    let image = report.image.expect("sentinel run keeps the result");
    assert_eq!((image.width(), image.height()), (1000, 700));

    // Nothing but the three inputs was written.
    let entries = std::fs::read_dir(dir.path()).unwrap().count();
    assert_eq!(entries, 3);
}

#[test]
fn waits_for_frames_still_being_written() {
    let dir = tempfile::tempdir().unwrap();
    let early = dir.path().join("early.png");
    frame(1000, 700, 10).save(&early).unwrap();
    let late = dir.path().join("late.png");

    let writer = {
        let late = late.clone();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(400));
            frame(1000, 700, 20).save(&late).unwrap();
        })
    };

    let report = run_stack(
        &StackOptions {
            inputs: vec![early, late],
            output: MEMORY_SENTINEL.to_string(),
            wait_images: Duration::from_secs(5),
            threads: 2,
            ..StackOptions::default()
        },
        &logger(),
    )
    .unwrap();
    writer.join().unwrap();

    assert!(report.image.is_some());
}

#[test]
fn failing_frame_fails_the_job() {
    let dir = tempfile::tempdir().unwrap();
    let mut inputs = write_stack(dir.path());
    inputs.push(dir.path().join("missing.png"));

    let err = run_stack(
        &StackOptions {
            inputs,
            output: MEMORY_SENTINEL.to_string(),
            threads: 2,
            ..StackOptions::default()
        },
        &logger(),
    )
    .unwrap_err();

    assert!(err.to_string().contains("could not load"), "{err}");
    assert!(err.to_string().contains("missing.png"), "{err}");
}
