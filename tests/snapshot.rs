//! Live snapshot conversion tests.
//!
//! Snapshots are synthetic `BGR0` buffers, so no fixture media is needed.

use thumbgrab::{FailureKind, RawSnapshot, SnapshotSource, ThumbnailError, snapshot_thumbnail};

const BLUE: [u8; 4] = [0xFF, 0x00, 0x00, 0x00];
const GREEN: [u8; 4] = [0x00, 0xFF, 0x00, 0x00];
const RED: [u8; 4] = [0x00, 0x00, 0xFF, 0x00];

/// Build a `BGR0` snapshot whose pixel colour is chosen per column.
fn striped_snapshot(width: u32, height: u32, padding: usize, color: impl Fn(u32) -> [u8; 4]) -> RawSnapshot {
    let stride = width as usize * 4 + padding;
    let mut data = vec![0xAA_u8; stride * height as usize];
    for row in 0..height as usize {
        for column in 0..width {
            let offset = row * stride + column as usize * 4;
            data[offset..offset + 4].copy_from_slice(&color(column));
        }
    }
    RawSnapshot::new(width, height, stride, data).expect("valid snapshot")
}

fn assert_mostly(pixel: u32, red: u8, green: u8, blue: u8) {
    let [b, g, r, a] = pixel.to_le_bytes();
    assert_eq!(a, 0xFF, "pixel {pixel:#010x} should be opaque");
    for (actual, expected) in [(r, red), (g, green), (b, blue)] {
        assert!(
            actual.abs_diff(expected) <= 8,
            "pixel {pixel:#010x} differs from rgb({red}, {green}, {blue})"
        );
    }
}

#[test]
fn wide_snapshot_keeps_the_center() {
    // Blue | green | red thirds; the centered square is entirely green.
    let snapshot = striped_snapshot(48, 16, 0, |column| match column {
        0..16 => BLUE,
        16..32 => GREEN,
        _ => RED,
    });

    let image = snapshot_thumbnail(&snapshot, 24).expect("Failed to convert snapshot");
    assert_eq!((image.width(), image.height()), (24, 24));
    for pixel in image.pixels() {
        assert_mostly(*pixel, 0x00, 0xFF, 0x00);
    }
}

#[test]
fn tall_snapshot_is_square() {
    let snapshot = striped_snapshot(20, 60, 0, |_| RED);
    let image = snapshot_thumbnail(&snapshot, 100).expect("Failed to convert snapshot");
    assert_eq!((image.width(), image.height()), (100, 100));
    assert_mostly(image.pixels()[50 * 100 + 50], 0xFF, 0x00, 0x00);
}

#[test]
fn row_padding_is_ignored() {
    let snapshot = striped_snapshot(32, 32, 24, |_| BLUE);
    let image = snapshot_thumbnail(&snapshot, 16).expect("Failed to convert snapshot");
    for pixel in image.pixels() {
        assert_mostly(*pixel, 0x00, 0x00, 0xFF);
    }
}

#[test]
fn dimension_is_validated() {
    let snapshot = striped_snapshot(8, 8, 0, |_| GREEN);
    for dimension in [0, 4097] {
        let error = snapshot_thumbnail(&snapshot, dimension).unwrap_err();
        assert_eq!(error.kind(), FailureKind::InvalidParameter);
    }
}

#[test]
fn short_buffer_is_rejected() {
    let error = RawSnapshot::new(16, 16, 64, vec![0; 64 * 15]).unwrap_err();
    assert_eq!(error.kind(), FailureKind::InvalidParameter);
    assert!(error.to_string().contains("needs"), "{error}");
}

struct FakePlayer {
    captures: usize,
    fail: bool,
}

impl SnapshotSource for FakePlayer {
    fn capture(&mut self) -> Result<RawSnapshot, ThumbnailError> {
        self.captures += 1;
        if self.fail {
            return Err(ThumbnailError::ConversionFailure("player is idle".into()));
        }
        Ok(striped_snapshot(64, 36, 0, |_| GREEN))
    }
}

#[test]
fn source_grabs_square_thumbnails() {
    let mut player = FakePlayer {
        captures: 0,
        fail: false,
    };
    let image = player.grab_thumbnail(32).expect("Failed to grab thumbnail");
    assert_eq!((image.width(), image.height()), (32, 32));
    assert_eq!(player.captures, 1);
}

#[test]
fn source_errors_pass_through() {
    let mut player = FakePlayer {
        captures: 0,
        fail: true,
    };
    let error = player.grab_thumbnail(32).unwrap_err();
    assert!(error.to_string().contains("player is idle"));
}
