//! Vision aggregation: raw color blobs to physical fruit estimates
//!
//! The camera reports pixel rectangles per color signature. Each cycle the
//! aggregator keeps the single largest qualifying blob, converts it through
//! the rig's pinhole geometry, and maintains a rolling average so the
//! approach controllers see a stable target through frame-to-frame noise.

use std::collections::VecDeque;

use common::types::{Centimeters, Degrees, FruitColor, FruitSize};

use crate::config::VisionConfig;
use crate::peripheral::{Blob, VisionSensor};

/// A fruit detection converted into physical units
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocatedObject {
    /// Straight-line distance to the fruit (not the horizontal distance)
    pub dist: Centimeters,
    /// Height of the fruit above the ground
    pub height: Centimeters,
    /// Horizontal angle to the fruit, right of center positive
    pub angle_to: Degrees,
    /// Signature the fruit was detected with
    pub color: FruitColor,
    pub size: FruitSize,
}

impl LocatedObject {
    /// Converts a raw blob's pixel geometry into distances
    ///
    /// The apparent width fixes the distance given the known fruit radius;
    /// the aspect ratio picks which of the two fruit sizes is in view.
    pub fn from_blob(color: FruitColor, blob: &Blob, config: &VisionConfig) -> Self {
        let ratio = blob.width as f64 / blob.height as f64;
        let (radius, size) = if ratio > config.wide_ratio {
            (config.wide_radius_cm, FruitSize::Wide)
        } else {
            (config.narrow_radius_cm, FruitSize::Narrow)
        };

        let half_angle = config.rad_per_px * blob.width as f64 / 2.0 + config.half_angle_offset_rad;
        let dist = radius / half_angle.sin();
        let height =
            ((config.horizon_row_px - blob.center_y as f64) * config.rad_per_px).sin() * dist;
        let angle_to = (blob.center_x as f64 - config.center_col_px) * config.deg_per_px;

        LocatedObject {
            dist: Centimeters(dist),
            height: Centimeters(height),
            angle_to: Degrees(angle_to),
            color,
            size,
        }
    }
}

/// The blob currently tracked as the largest detection
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub color: FruitColor,
    pub blob: Blob,
}

/// Per-cycle vision state
pub struct Camera {
    sensor: Box<dyn VisionSensor>,
    config: VisionConfig,
    /// Largest qualifying blob this cycle, if any
    pub largest: Option<Detection>,
    /// Rolling average of the tracked detection, dropped after sustained loss
    pub average: Option<LocatedObject>,
    window: VecDeque<LocatedObject>,
    no_detect_us: u64,
}

impl Camera {
    pub fn new(sensor: Box<dyn VisionSensor>, config: VisionConfig) -> Self {
        Camera {
            sensor,
            config,
            largest: None,
            average: None,
            window: VecDeque::new(),
            no_detect_us: 0,
        }
    }

    pub fn window_len(&self) -> usize {
        self.window.len()
    }

    /// Updates all vision state; runs once per cycle
    pub fn update(&mut self, dt_us: u64) {
        self.largest = None;
        for color in FruitColor::ALL {
            for blob in self.sensor.snapshot(color) {
                if blob.area() < self.config.min_area_px {
                    continue;
                }
                // strictly taller wins; an equal-height later blob does not
                // displace the one found first
                let taller = match &self.largest {
                    None => true,
                    Some(tracked) => blob.height > tracked.blob.height,
                };
                if taller {
                    self.largest = Some(Detection { color, blob });
                }
            }
        }

        if let Some(tracked) = self.largest {
            self.no_detect_us = 0;
            self.window.push_front(LocatedObject::from_blob(
                tracked.color,
                &tracked.blob,
                &self.config,
            ));
            self.window.truncate(self.config.window_len);

            let n = self.window.len() as f64;
            let newest = self.window[0];
            self.average = Some(LocatedObject {
                dist: Centimeters(self.window.iter().map(|o| o.dist.0).sum::<f64>() / n),
                height: Centimeters(self.window.iter().map(|o| o.height.0).sum::<f64>() / n),
                angle_to: Degrees(self.window.iter().map(|o| o.angle_to.0).sum::<f64>() / n),
                color: newest.color,
                size: newest.size,
            });
        } else if self.no_detect_us > self.config.loss_timeout_us {
            // a full second without a sighting: the target is gone, not noisy
            self.window.clear();
            self.average = None;
        } else {
            self.no_detect_us += dt_us;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peripheral::bench::BenchCamera;

    fn camera() -> (Camera, BenchCamera) {
        let bench = BenchCamera::new();
        let camera = Camera::new(Box::new(bench.clone()), VisionConfig::default());
        (camera, bench)
    }

    fn blob(center_x: i32, center_y: i32, width: u32, height: u32) -> Blob {
        Blob {
            center_x,
            center_y,
            width,
            height,
        }
    }

    #[test]
    fn square_blob_classifies_wide_with_finite_distance() {
        let located = LocatedObject::from_blob(
            FruitColor::Green,
            &blob(158, 137, 100, 100),
            &VisionConfig::default(),
        );
        assert_eq!(located.size, FruitSize::Wide);
        assert!(located.dist.0 > 0.0 && located.dist.0.is_finite());
        // centered on the horizon row and optical center
        assert!(located.height.0.abs() < 1e-9);
        assert!(located.angle_to.0.abs() < 1e-9);
    }

    #[test]
    fn tall_blob_classifies_narrow() {
        let located = LocatedObject::from_blob(
            FruitColor::Yellow,
            &blob(100, 100, 40, 80),
            &VisionConfig::default(),
        );
        assert_eq!(located.size, FruitSize::Narrow);
    }

    #[test]
    fn blobs_under_minimum_area_are_ignored() {
        let (mut camera, bench) = camera();
        bench.feed_blobs(FruitColor::Green, vec![blob(100, 100, 7, 7)]);
        camera.update(1);
        assert!(camera.largest.is_none());
        assert!(camera.average.is_none());
    }

    #[test]
    fn first_signature_wins_height_ties() {
        let (mut camera, bench) = camera();
        bench.feed_blobs(FruitColor::Green, vec![blob(50, 100, 30, 60)]);
        bench.feed_blobs(FruitColor::Orange, vec![blob(200, 100, 30, 60)]);
        camera.update(1);
        assert_eq!(camera.largest.unwrap().color, FruitColor::Green);

        // a strictly taller later signature does displace it
        bench.feed_blobs(FruitColor::Orange, vec![blob(200, 100, 30, 61)]);
        camera.update(1);
        assert_eq!(camera.largest.unwrap().color, FruitColor::Orange);
    }

    #[test]
    fn window_caps_at_fifty_newest_first() {
        let (mut camera, bench) = camera();
        for i in 0..60 {
            bench.feed_blobs(FruitColor::Green, vec![blob(100 + i, 100, 30, 60)]);
            camera.update(1);
        }
        assert_eq!(camera.window_len(), 50);
        // newest entry drives the reported color and size
        let average = camera.average.unwrap();
        assert_eq!(average.color, FruitColor::Green);
    }

    #[test]
    fn average_is_arithmetic_mean() {
        let (mut camera, bench) = camera();
        bench.feed_blobs(FruitColor::Green, vec![blob(158, 137, 40, 80)]);
        camera.update(1);
        let first = camera.average.unwrap().dist.0;

        bench.feed_blobs(FruitColor::Green, vec![blob(158, 137, 60, 80)]);
        camera.update(1);
        let second_sample = LocatedObject::from_blob(
            FruitColor::Green,
            &blob(158, 137, 60, 80),
            &VisionConfig::default(),
        )
        .dist
        .0;
        let mean = camera.average.unwrap().dist.0;
        assert!((mean - (first + second_sample) / 2.0).abs() < 1e-9);
    }

    #[test]
    fn average_survives_until_a_full_second_of_loss() {
        let (mut camera, bench) = camera();
        bench.feed_blobs(FruitColor::Green, vec![blob(100, 100, 30, 60)]);
        camera.update(1);
        assert!(camera.average.is_some());

        // detection disappears; 999 999 us of loss must keep the average
        bench.clear();
        camera.update(999_999);
        assert!(camera.average.is_some());

        // the clear happens on the first check past the accumulated second
        camera.update(2);
        assert!(camera.average.is_some());
        camera.update(1);
        assert!(camera.average.is_none());
        assert_eq!(camera.window_len(), 0);
    }

    #[test]
    fn redetection_resets_the_loss_clock() {
        let (mut camera, bench) = camera();
        bench.feed_blobs(FruitColor::Green, vec![blob(100, 100, 30, 60)]);
        camera.update(1);

        bench.clear();
        camera.update(900_000);
        bench.feed_blobs(FruitColor::Green, vec![blob(100, 100, 30, 60)]);
        camera.update(1);

        bench.clear();
        camera.update(900_000);
        camera.update(900_000);
        // only 1.8s since redetection reset the counter partway
        assert!(camera.average.is_some());
    }
}
