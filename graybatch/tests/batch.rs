use graybatch::batch;
use graybatch::luminance::luma_u8;
use graybatch::{Backend, BatchConfig, FileOutcome, ImageFormat, OutputNaming};
use imageproc::image::{self, ColorType, GrayImage, ImageBuffer, Rgb, RgbImage, Rgba};

use std::fs;
use std::path::Path;

fn cpu_config(input: &Path, output: &Path) -> BatchConfig {
    BatchConfig {
        input_dir: input.to_path_buf(),
        output_dir: output.to_path_buf(),
        backend: Backend::Cpu,
        ..Default::default()
    }
}

fn rgb_gradient(width: u32, height: u32) -> RgbImage {
    ImageBuffer::from_fn(width, height, |x, y| {
        Rgb([(x * 40) as u8, (y * 60) as u8, ((x + y) * 10) as u8])
    })
}

fn read_gray(path: &Path) -> GrayImage {
    let img = image::open(path).unwrap();
    assert_eq!(img.color(), ColorType::L8, "{} is not single channel", path.display());
    img.into_luma8()
}

#[test]
fn converts_valid_images_and_skips_the_rest() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();

    let rgb = rgb_gradient(5, 3);
    rgb.save(input.path().join("a_rgb.png")).unwrap();

    let rgba = ImageBuffer::from_pixel(2, 4, Rgba([90u8, 180, 20, 7]));
    rgba.save(input.path().join("b_rgba.png")).unwrap();

    fs::write(input.path().join("c_corrupt.png"), b"\x89PNG\r\n\x1a\ntruncated").unwrap();
    fs::write(input.path().join("d_notes.txt"), "not an image").unwrap();
    fs::create_dir(input.path().join("e_subdir")).unwrap();

    let rgb_last = rgb_gradient(1, 1);
    rgb_last.save(input.path().join("f_last.png")).unwrap();

    let report = batch::run(&cpu_config(input.path(), output.path())).unwrap();

    assert_eq!(report.files.len(), 6);
    assert_eq!(report.converted(), 3);
    assert_eq!(report.failed(), 3);
    assert!(matches!(report.files[2].outcome, FileOutcome::DecodeFailed { .. }));
    assert!(matches!(report.files[3].outcome, FileOutcome::DecodeFailed { .. }));
    assert!(matches!(report.files[4].outcome, FileOutcome::DecodeFailed { .. }));
    // a corrupt file in the middle does not stop later files
    assert!(report.files[5].outcome.is_converted());

    let mut written: Vec<_> = fs::read_dir(output.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .collect();
    written.sort();
    assert_eq!(written, ["a_rgb.png", "b_rgba.png", "f_last.png"]);

    let gray = read_gray(&output.path().join("a_rgb.png"));
    assert_eq!(gray.dimensions(), rgb.dimensions());
    for (x, y, px) in rgb.enumerate_pixels() {
        assert_eq!(gray.get_pixel(x, y)[0], luma_u8(px[0], px[1], px[2]));
    }

    let gray = read_gray(&output.path().join("b_rgba.png"));
    assert_eq!(gray.dimensions(), (2, 4));
    assert!(gray.pixels().all(|p| p[0] == luma_u8(90, 180, 20)));
}

#[test]
fn empty_directory_writes_nothing() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();

    let report = batch::run(&cpu_config(input.path(), output.path())).unwrap();

    assert!(report.files.is_empty());
    assert_eq!(fs::read_dir(output.path()).unwrap().count(), 0);
}

#[test]
fn directory_of_junk_writes_nothing() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    fs::write(input.path().join("one.jpg"), b"").unwrap();
    fs::write(input.path().join("two.png"), b"garbage").unwrap();

    let report = batch::run(&cpu_config(input.path(), output.path())).unwrap();

    assert_eq!(report.converted(), 0);
    assert_eq!(fs::read_dir(output.path()).unwrap().count(), 0);
}

#[test]
fn missing_input_directory_is_an_error() {
    let root = tempfile::tempdir().unwrap();
    let config = cpu_config(&root.path().join("does_not_exist"), &root.path().join("out"));

    let err = batch::run(&config).unwrap_err();
    assert!(err.to_string().contains("Error opening input folder"));
    assert!(!root.path().join("out").exists());
}

#[test]
fn creates_missing_output_directory() {
    let input = tempfile::tempdir().unwrap();
    let root = tempfile::tempdir().unwrap();
    rgb_gradient(3, 2).save(input.path().join("img.png")).unwrap();
    let output = root.path().join("nested").join("out");

    let report = batch::run(&cpu_config(input.path(), &output)).unwrap();

    assert_eq!(report.converted(), 1);
    assert!(output.join("img.png").is_file());
}

#[test]
fn uncreatable_output_directory_fails_each_write() {
    let input = tempfile::tempdir().unwrap();
    let root = tempfile::tempdir().unwrap();
    rgb_gradient(3, 2).save(input.path().join("a.png")).unwrap();
    rgb_gradient(2, 2).save(input.path().join("b.png")).unwrap();
    let blocker = root.path().join("blocker");
    fs::write(&blocker, "regular file").unwrap();

    for output in [blocker.join("out"), blocker.clone()] {
        let report = batch::run(&cpu_config(input.path(), &output)).unwrap();

        assert_eq!(report.files.len(), 2);
        assert_eq!(report.converted(), 0);
        assert!(report
            .files
            .iter()
            .all(|f| matches!(f.outcome, FileOutcome::WriteFailed { .. })));
    }
    assert!(blocker.is_file());
}

#[test]
fn same_name_output_keeps_jpeg_name_with_png_content() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    // the name says jpeg, the decoder sniffs the content
    rgb_gradient(4, 4)
        .save_with_format(input.path().join("ISIC_0052060.jpg"), image::ImageFormat::Png)
        .unwrap();

    batch::run(&cpu_config(input.path(), output.path())).unwrap();

    let written = output.path().join("ISIC_0052060.jpg");
    let bytes = fs::read(&written).unwrap();
    assert_eq!(&bytes[..4], b"\x89PNG");
    assert_eq!(read_gray(&written).dimensions(), (4, 4));
}

#[test]
fn replace_extension_with_jpeg_output() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    rgb_gradient(8, 6).save(input.path().join("scan.v2.png")).unwrap();

    let config = BatchConfig {
        image_format: ImageFormat::Jpeg { quality: 95 },
        naming: OutputNaming::ReplaceExtension,
        ..cpu_config(input.path(), output.path())
    };
    let report = batch::run(&config).unwrap();

    let expected = output.path().join("scan.v2.jpg");
    match &report.files[0].outcome {
        FileOutcome::Converted { output, width, height, channels } => {
            assert_eq!(output, &expected);
            assert_eq!((*width, *height, *channels), (8, 6, 3));
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    assert_eq!(read_gray(&expected).dimensions(), (8, 6));
}

#[test]
fn auto_backend_always_produces_output() {
    // GPU when present, CPU fallback otherwise; either way the file is written
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    let rgb = rgb_gradient(7, 5);
    rgb.save(input.path().join("auto.png")).unwrap();

    let config = BatchConfig {
        backend: Backend::Auto,
        ..cpu_config(input.path(), output.path())
    };
    let report = batch::run(&config).unwrap();
    assert_eq!(report.converted(), 1);

    let gray = read_gray(&output.path().join("auto.png"));
    for (x, y, px) in rgb.enumerate_pixels() {
        assert_eq!(gray.get_pixel(x, y)[0], luma_u8(px[0], px[1], px[2]));
    }
}
