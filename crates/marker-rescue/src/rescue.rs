//! The recovery orchestrator: per-frame policy over tracking, template
//! re-acquisition and identity verification.

use crate::reacquire::reacquire;
use crate::track::MotionTracker;
use crate::verify::IdentityVerifier;
use crate::{
    MarkerIdDecoder, MarkerTemplate, RecoveryAttempt, RecoverySource, RescueConfig, TemplateStore,
    TrackerState,
};
use marker_rescue_core::{refine_quad, GrayImage, GrayImageView, Quad, SubpixParams};
use marker_rescue_features::FeatureExtractor;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Recovers missing fiducial-marker detections.
///
/// One instance per camera stream; all state (template store, tracker-state
/// table, re-acquire timestamps, frame counter) lives inside the instance
/// and is mutated only by [`MarkerRescue::recover_missing`]. Instances are
/// independent: embedding several in one process shares nothing.
pub struct MarkerRescue {
    cfg: RescueConfig,
    enabled: bool,
    extractor: FeatureExtractor,
    templates: TemplateStore,
    motion: MotionTracker,
    verifier: IdentityVerifier,
    states: HashMap<u32, TrackerState>,
    last_reacquire: HashMap<u32, u64>,
    frame_index: u64,
}

impl MarkerRescue {
    /// Build an orchestrator with an empty template store.
    ///
    /// Construction never fails: a disabled config or missing capabilities
    /// produce a cheap pass-through, decided here once.
    pub fn new(cfg: RescueConfig) -> Self {
        let enabled = cfg.enabled;
        if !enabled {
            log::info!("marker recovery disabled by configuration");
        }
        let extractor = FeatureExtractor::new(cfg.features);
        let verifier = IdentityVerifier::new(cfg.verify_id, None);
        Self {
            cfg,
            enabled,
            extractor,
            templates: TemplateStore::new(),
            motion: MotionTracker::new(),
            verifier,
            states: HashMap::new(),
            last_reacquire: HashMap::new(),
            frame_index: 0,
        }
    }

    /// Build from config and load templates from `cfg.template_dir`.
    #[cfg(feature = "image")]
    pub fn from_config(cfg: RescueConfig) -> Self {
        let mut this = Self::new(cfg);
        if this.enabled {
            let store = TemplateStore::load_dir(&this.cfg.template_dir, &this.extractor);
            this.templates = store;
        }
        this
    }

    /// Replace the template store (features must come from this instance's
    /// extractor; see [`MarkerRescue::extractor`]).
    pub fn with_template_store(mut self, templates: TemplateStore) -> Self {
        self.templates = templates;
        self
    }

    /// Install the decoder used for identity verification.
    pub fn with_verifier(mut self, decoder: Box<dyn MarkerIdDecoder>) -> Self {
        self.verifier = IdentityVerifier::new(self.cfg.verify_id, Some(decoder));
        self
    }

    #[inline]
    pub fn config(&self) -> &RescueConfig {
        &self.cfg
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    #[inline]
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    #[inline]
    pub fn templates(&self) -> &TemplateStore {
        &self.templates
    }

    /// The extractor templates must be built with.
    #[inline]
    pub fn extractor(&self) -> &FeatureExtractor {
        &self.extractor
    }

    /// Color-frame entry point.
    #[cfg(feature = "image")]
    pub fn recover_missing_rgb(
        &mut self,
        frame: &::image::RgbImage,
        detected: &HashMap<u32, Quad>,
        expected: &BTreeSet<u32>,
    ) -> (HashMap<u32, Quad>, Vec<RecoveryAttempt>) {
        let gray = ::image::imageops::grayscale(frame);
        let view = GrayImageView {
            width: gray.width() as usize,
            height: gray.height() as usize,
            data: gray.as_raw(),
        };
        self.recover_missing(&view, detected, expected)
    }

    /// Merge recovered markers into the detection set for one frame.
    ///
    /// Directly detected markers pass through untouched and refresh their
    /// tracker state. For each missing marker (most recently seen first, at
    /// most `max_fallback_markers_per_frame` of them) the policy is: motion
    /// tracking if the state is fresh enough, then template re-acquisition
    /// if the rate limit allows, each winner gated by identity verification.
    #[cfg_attr(
        feature = "tracing",
        instrument(
            level = "info",
            skip(self, frame, detected, expected),
            fields(width = frame.width, height = frame.height, detected = detected.len())
        )
    )]
    pub fn recover_missing(
        &mut self,
        frame: &GrayImageView<'_>,
        detected: &HashMap<u32, Quad>,
        expected: &BTreeSet<u32>,
    ) -> (HashMap<u32, Quad>, Vec<RecoveryAttempt>) {
        if !self.enabled {
            return (detected.clone(), Vec::new());
        }

        self.frame_index += 1;
        let mut output = detected.clone();
        let mut attempts = Vec::new();

        let snapshot = Arc::new(GrayImage {
            width: frame.width,
            height: frame.height,
            data: frame.data.to_vec(),
        });

        let mut direct_ids: Vec<u32> = detected.keys().copied().collect();
        direct_ids.sort_unstable();
        for id in direct_ids {
            let corners = detected[&id];
            if corners.is_finite() {
                self.states.insert(
                    id,
                    TrackerState {
                        marker_id: id,
                        last_corners: corners,
                        last_seen_frame_index: self.frame_index,
                        last_gray: snapshot.clone(),
                    },
                );
            } else {
                log::warn!("marker {id}: upstream corners are not finite; state not updated");
            }
            attempts.push(RecoveryAttempt::direct(id, corners));
        }

        let mut missing: Vec<u32> = expected
            .iter()
            .copied()
            .filter(|id| !detected.contains_key(id))
            .collect();
        if missing.is_empty() {
            return (output, attempts);
        }
        log::debug!(
            "frame {}: missing markers {:?}",
            self.frame_index,
            missing
        );

        // Most recently seen first; ties break on ascending id because the
        // input is already id-sorted and the sort is stable.
        missing.sort_by_key(|id| {
            std::cmp::Reverse(
                self.states
                    .get(id)
                    .map(|s| s.last_seen_frame_index)
                    .unwrap_or(0),
            )
        });

        let mut budget = self.cfg.max_fallback_markers_per_frame;
        for id in missing {
            if budget == 0 {
                log::debug!(
                    "frame {}: fallback budget exhausted, remaining markers stay missing",
                    self.frame_index
                );
                break;
            }

            let state = self.states.get(&id).cloned();
            let trackable = state
                .as_ref()
                .is_some_and(|s| self.frame_index - s.last_seen_frame_index <= self.cfg.max_age_frames);
            let interval_ok = match self.last_reacquire.get(&id) {
                Some(&last) => self.frame_index - last >= self.cfg.reacquire_interval_frames,
                None => true,
            };
            let reacquirable = self.templates.contains(id) && interval_ok;

            if !trackable && !reacquirable {
                if self.templates.contains(id) {
                    log::debug!(
                        "marker {id}: re-acquire rate-limited ({} frame interval)",
                        self.cfg.reacquire_interval_frames
                    );
                } else {
                    log::debug!("marker {id}: no template and no fresh track state");
                }
                continue;
            }

            budget -= 1;
            let record = self.attempt_recovery(id, frame, state.as_ref(), trackable, reacquirable);

            if let Some(corners) = record.corners {
                // Defensive re-check before merging; both stages already
                // guarantee this.
                if corners.is_finite() && corners.in_bounds(frame.width, frame.height) {
                    log::info!(
                        "frame {}: recovered marker {id} via {:?} (quality {:.2})",
                        self.frame_index,
                        record.source,
                        record.match_quality
                    );
                    output.insert(id, corners);
                    self.states.insert(
                        id,
                        TrackerState {
                            marker_id: id,
                            last_corners: corners,
                            last_seen_frame_index: self.frame_index,
                            last_gray: snapshot.clone(),
                        },
                    );
                    attempts.push(record);
                } else {
                    log::warn!("marker {id}: recovered corners malformed, dropped");
                    attempts.push(RecoveryAttempt::failed(id, record.source));
                }
            } else {
                attempts.push(record);
            }
        }

        (output, attempts)
    }

    /// Run the per-marker strategy chain; exactly one of `trackable` /
    /// `reacquirable` may still fail internally, in which case a failed
    /// record is returned.
    fn attempt_recovery(
        &mut self,
        id: u32,
        frame: &GrayImageView<'_>,
        state: Option<&TrackerState>,
        trackable: bool,
        reacquirable: bool,
    ) -> RecoveryAttempt {
        let mut last_source = RecoverySource::Tracked;

        if trackable {
            let state = state.expect("trackable implies state");
            if let Some(out) = self.motion.propagate(state, frame, self.cfg.roi_expand_px) {
                let corners = self.maybe_refine(frame, out.corners);
                if self.verifier.accepts(frame, &corners, id) {
                    return RecoveryAttempt {
                        marker_id: id,
                        corners: Some(corners),
                        source: RecoverySource::Tracked,
                        inlier_count: 4,
                        match_quality: (1.0 - out.mean_error / 255.0).clamp(0.0, 1.0),
                        homography: None,
                    };
                }
                log::debug!("marker {id}: tracked candidate failed identity verification");
            }
        }

        if reacquirable {
            last_source = RecoverySource::Reacquired;
            // Attempt cost triggers the rate limit, not attempt success:
            // a failed match or failed verification still waits the full
            // interval before the next try.
            self.last_reacquire.insert(id, self.frame_index);

            let template: &MarkerTemplate =
                self.templates.get(id).expect("reacquirable implies template");
            if let Some(out) = reacquire(template, frame, state, &self.extractor, &self.cfg) {
                let corners = self.maybe_refine(frame, out.corners);
                if self.verifier.accepts(frame, &corners, id) {
                    return RecoveryAttempt {
                        marker_id: id,
                        corners: Some(corners),
                        source: RecoverySource::Reacquired,
                        inlier_count: out.inlier_count,
                        match_quality: out.match_quality,
                        homography: Some(out.homography),
                    };
                }
                log::warn!("marker {id}: re-acquired candidate failed identity verification");
            }
        }

        RecoveryAttempt::failed(id, last_source)
    }

    fn maybe_refine(&self, frame: &GrayImageView<'_>, corners: Quad) -> Quad {
        if self.cfg.corner_refine {
            refine_quad(frame, &corners, &SubpixParams::default())
        } else {
            corners
        }
    }
}
