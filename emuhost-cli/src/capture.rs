//! Writing captured frames and audio to disk.

use anyhow::{Context, Result, ensure};
use emuhost_core::PixelFormat;
use emuhost_core::av::convert::rgb565_to_rgb888;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// Save a `width x height` RGB565 surface as an 8-bit RGB PNG.
pub fn write_png(path: &Path, rgb565: &[u8], width: u32, height: u32) -> Result<()> {
    let bpp = PixelFormat::Rgb565.bytes_per_pixel() as usize;
    let expected = width as usize * height as usize * bpp;
    ensure!(expected > 0, "the core has not presented a frame");
    ensure!(
        rgb565.len() == expected,
        "surface holds {} bytes, a {width}x{height} frame needs {expected}",
        rgb565.len()
    );

    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let w = BufWriter::new(file);
    let mut encoder = png::Encoder::new(w, width, height);
    encoder.set_color(png::ColorType::Rgb);
    encoder.set_depth(png::BitDepth::Eight);
    let mut writer = encoder.write_header()?;
    writer.write_image_data(&rgb565_to_rgb888(rgb565))?;
    Ok(())
}

/// Largest absolute sample value, for a rough level meter.
pub fn peak_level(samples: &[i16]) -> u16 {
    samples
        .iter()
        .map(|s| s.unsigned_abs())
        .max()
        .unwrap_or(0)
}

/// Save interleaved stereo `samples` as a 16-bit PCM WAV at `sample_rate` Hz.
pub fn write_wav(path: &Path, samples: &[i16], sample_rate: u32) -> Result<()> {
    let spec = hound::WavSpec {
        channels: 2,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)
        .with_context(|| format!("creating {}", path.display()))?;
    for &sample in samples {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use emuhost_core::av::convert::rgb888_to_rgb565;

    #[test]
    fn png_holds_converted_frame() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shot.png");

        let pixels: Vec<u8> = [
            rgb888_to_rgb565(255, 0, 0),
            rgb888_to_rgb565(0, 255, 0),
            rgb888_to_rgb565(0, 0, 255),
            rgb888_to_rgb565(255, 255, 255),
        ]
        .concat();
        write_png(&path, &pixels, 2, 2).unwrap();

        let decoder = png::Decoder::new(File::open(&path).unwrap());
        let mut reader = decoder.read_info().unwrap();
        let mut buf = vec![0; reader.output_buffer_size()];
        let info = reader.next_frame(&mut buf).unwrap();
        assert_eq!((info.width, info.height), (2, 2));
        assert_eq!(info.color_type, png::ColorType::Rgb);
        assert_eq!(
            &buf[..info.buffer_size()],
            &[255, 0, 0, 0, 255, 0, 0, 0, 255, 255, 255, 255]
        );
    }

    #[test]
    fn png_needs_a_matching_frame() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.png");
        assert!(write_png(&path, &[], 0, 0).is_err());
        assert!(write_png(&path, &[0; 6], 2, 2).is_err());
        assert!(!path.exists());
    }

    #[test]
    fn peak_level_handles_extremes() {
        assert_eq!(peak_level(&[]), 0);
        assert_eq!(peak_level(&[3, -7, 5]), 7);
        assert_eq!(peak_level(&[i16::MIN, 0]), 32768);
    }

    #[test]
    fn wav_keeps_samples_and_rate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.wav");
        let samples = [0i16, 1, -1, i16::MAX, i16::MIN, 42];
        write_wav(&path, &samples, 32_768).unwrap();

        let mut reader = hound::WavReader::open(&path).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 2);
        assert_eq!(spec.sample_rate, 32_768);
        let read: Vec<i16> = reader.samples::<i16>().map(Result::unwrap).collect();
        assert_eq!(read, samples);
    }
}
