#[cfg(test)]
mod tests {
    use crate::abi::PixelFormat;
    use crate::av::convert::{rgb565_to_rgb888, rgb888_to_rgb565};
    use crate::av::{AudioSampleQueue, AvError, FrameBuffer};

    /// A frame whose every byte encodes its (row, column) so misplaced rows show up.
    fn patterned_frame(width: u32, height: u32, pitch: usize) -> Vec<u8> {
        let mut src = vec![0xEEu8; pitch * height as usize];
        for y in 0..height as usize {
            for x in 0..(width as usize * 2) {
                src[y * pitch + x] = (y as u8).wrapping_mul(31) ^ (x as u8);
            }
        }
        src
    }

    #[test]
    fn buffer_length_tracks_dimensions() {
        let mut fb = FrameBuffer::new(PixelFormat::Rgb565);
        assert!(!fb.is_allocated());
        assert!(fb.pixels().is_empty());

        for (w, h) in [(1, 1), (160, 144), (320, 240), (7, 3), (256, 224)] {
            fb.resize(w, h).unwrap();
            assert_eq!(fb.pixels().len(), (w * h * 2) as usize);
            assert_eq!(fb.dimensions(), (w, h));
        }
    }

    #[test]
    fn storage_never_exceeds_largest_frame() {
        let mut fb = FrameBuffer::new(PixelFormat::Rgb565);
        let sizes = [(160, 144), (320, 240), (256, 224), (64, 64), (320, 240)];
        let largest = sizes.iter().map(|(w, h)| w * h * 2).max().unwrap() as usize;

        for (w, h) in sizes {
            fb.resize(w, h).unwrap();
        }
        assert_eq!(fb.pixels().len(), 320 * 240 * 2);
        assert_eq!(fb.allocated_bytes(), largest);

        // Shrinking keeps the allocation but not the old logical size.
        fb.resize(10, 10).unwrap();
        assert_eq!(fb.pixels().len(), 200);
        assert_eq!(fb.allocated_bytes(), largest);
    }

    #[test]
    fn padded_pitch_is_skipped_row_by_row() {
        let (width, height, pitch) = (256u32, 240u32, 600usize);
        let src = patterned_frame(width, height, pitch);

        let mut fb = FrameBuffer::new(PixelFormat::Rgb565);
        fb.write_pitched(&src, width, height, pitch).unwrap();

        assert_eq!(fb.pixels().len(), 256 * 240 * 2);
        for (y, row) in fb.pixels().chunks_exact(512).enumerate() {
            assert_eq!(row, &src[y * pitch..y * pitch + 512], "row {y} differs");
        }
    }

    #[test]
    fn last_row_needs_no_padding() {
        let (width, height, pitch) = (4u32, 3u32, 12usize);
        let full = patterned_frame(width, height, pitch);
        // Drop the trailing padding of the final row.
        let trimmed = &full[..pitch * 2 + 8];

        let mut fb = FrameBuffer::new(PixelFormat::Rgb565);
        fb.write_pitched(trimmed, width, height, pitch).unwrap();
        assert_eq!(&fb.pixels()[16..], &full[24..32]);
    }

    #[test]
    fn rejects_pitch_smaller_than_row() {
        let mut fb = FrameBuffer::new(PixelFormat::Rgb565);
        let src = vec![0u8; 64];
        assert_eq!(
            fb.write_pitched(&src, 8, 2, 10),
            Err(AvError::PitchTooSmall {
                pitch: 10,
                row_bytes: 16
            })
        );
        assert!(!fb.is_allocated());
    }

    #[test]
    fn rejects_short_frame() {
        let mut fb = FrameBuffer::new(PixelFormat::Rgb565);
        let src = vec![0u8; 30];
        assert_eq!(
            fb.write_pitched(&src, 8, 2, 16),
            Err(AvError::ShortFrame {
                expected: 32,
                actual: 30
            })
        );
    }

    #[test]
    fn copy_into_untouched_before_first_frame() {
        let fb = FrameBuffer::new(PixelFormat::Rgb565);
        let mut sink = vec![0xAAu8; 8];
        assert_eq!(fb.copy_into(&mut sink), 0);
        assert!(sink.iter().all(|&b| b == 0xAA));
    }

    #[test]
    fn release_frees_storage() {
        let mut fb = FrameBuffer::new(PixelFormat::Rgb565);
        fb.resize(32, 32).unwrap();
        fb.release();
        assert!(!fb.is_allocated());
        assert_eq!(fb.allocated_bytes(), 0);
        assert_eq!(fb.dimensions(), (0, 0));
    }

    #[test]
    fn single_samples_match_batch() {
        let pairs: Vec<(i16, i16)> = (0..100).map(|i| (i * 3 - 150, -(i * 7))).collect();

        let mut one_by_one = AudioSampleQueue::new();
        for &(l, r) in &pairs {
            one_by_one.push_frame(l, r);
        }

        let interleaved: Vec<i16> = pairs.iter().flat_map(|&(l, r)| [l, r]).collect();
        let mut batched = AudioSampleQueue::new();
        assert_eq!(batched.push_interleaved(&interleaved), pairs.len());

        assert_eq!(one_by_one.as_slice(), batched.as_slice());
        assert_eq!(batched.frames(), 100);
    }

    #[test]
    fn batch_ignores_trailing_half_frame() {
        let mut q = AudioSampleQueue::new();
        assert_eq!(q.push_interleaved(&[1, 2, 3]), 1);
        assert_eq!(q.as_slice(), &[1, 2]);
    }

    #[test]
    fn drain_truncates_and_clears() {
        let mut q = AudioSampleQueue::new();
        q.push_interleaved(&[1, 2, 3, 4, 5, 6, 7, 8]);

        let mut sink = [0i16; 5];
        assert_eq!(q.drain_into(&mut sink), 5);
        assert_eq!(sink, [1, 2, 3, 4, 5]);
        assert!(q.is_empty());

        // Nothing carried over from the truncated step.
        let mut sink = [0i16; 8];
        assert_eq!(q.drain_into(&mut sink), 0);
        assert_eq!(sink, [0; 8]);
    }

    #[test]
    fn drain_into_larger_sink() {
        let mut q = AudioSampleQueue::new();
        q.push_frame(-1, 1);
        let mut sink = [9i16; 4];
        assert_eq!(q.drain_into(&mut sink), 2);
        assert_eq!(sink, [-1, 1, 9, 9]);
        assert!(q.is_empty());
    }

    #[test]
    fn rgb565_expands_to_full_range() {
        let white = rgb888_to_rgb565(255, 255, 255);
        let red = rgb888_to_rgb565(255, 0, 0);
        let px = [white, red].concat();
        assert_eq!(rgb565_to_rgb888(&px), vec![255, 255, 255, 255, 0, 0]);
    }
}
