//! Pairwise transitions between adjacent scene clips.
//!
//! A transition declared on scene `i` blends clip `i` into clip `i + 1` and
//! the merged clip replaces both in the list. Transitions are applied from
//! the second-to-last scene down to the first: position `i` then always
//! still holds scene `i`'s own clip, while position `i + 1` holds either the
//! next clip or everything already merged after it.

use std::path::{Path, PathBuf};

use kumiki_media::{filters, Encoder, TransitionRequest};
use kumiki_models::Scene;
use tracing::{debug, info};

use crate::error::{RenderError, RenderResult};
use crate::metrics;

pub struct TransitionEngine<'a> {
    encoder: &'a dyn Encoder,
    work_dir: &'a Path,
}

impl<'a> TransitionEngine<'a> {
    pub fn new(encoder: &'a dyn Encoder, work_dir: &'a Path) -> Self {
        Self { encoder, work_dir }
    }

    /// Apply every declared transition. `clips[i]` must be the clip of
    /// `scenes[i]`. `with_audio` blends audio streams too.
    pub async fn apply(
        &self,
        scenes: &[Scene],
        mut clips: Vec<PathBuf>,
        with_audio: bool,
    ) -> RenderResult<Vec<PathBuf>> {
        if clips.len() != scenes.len() {
            return Err(RenderError::Task(format!(
                "{} clips for {} scenes",
                clips.len(),
                scenes.len()
            )));
        }

        for index in (0..scenes.len().saturating_sub(1)).rev() {
            let Some(transition) = &scenes[index].transition else {
                continue;
            };

            let first = clips[index].clone();
            let second = clips[index + 1].clone();
            let first_duration = self.encoder.probe(&first).await?.duration;
            let offset = (first_duration - transition.duration).max(0.0);
            let output = self.work_dir.join(format!("transition_{}.mp4", index));

            info!(
                scene_id = %scenes[index].id,
                kind = %transition.kind,
                duration = transition.duration,
                offset,
                "Applying transition"
            );

            self.encoder
                .transition(&TransitionRequest {
                    first,
                    second,
                    output: output.clone(),
                    kind: transition.kind,
                    direction: transition.direction,
                    duration: transition.duration,
                    offset,
                    with_audio,
                })
                .await?;
            metrics::record_transition(filters::xfade_transition_name(
                transition.kind,
                transition.direction,
            ));

            clips.splice(index..=index + 1, [output]);
            debug!(remaining = clips.len(), "Clips after transition");
        }

        Ok(clips)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{text_scene, with_transition, Fakes};
    use kumiki_models::TransitionKind;

    async fn clips(fakes: &Fakes, durations: &[f64]) -> Vec<PathBuf> {
        let mut out = Vec::new();
        for (i, d) in durations.iter().enumerate() {
            out.push(fakes.clip(&format!("c{}.mp4", i), *d).await);
        }
        out
    }

    #[tokio::test]
    async fn test_alternating_transitions_merge_pairs() {
        let fakes = Fakes::new();
        let scenes = vec![
            with_transition(text_scene("s0", 5.0), TransitionKind::Fade, 1.0),
            text_scene("s1", 5.0),
            with_transition(text_scene("s2", 5.0), TransitionKind::Dissolve, 0.5),
            text_scene("s3", 5.0),
        ];
        let input = clips(&fakes, &[5.0, 5.0, 5.0, 5.0]).await;
        let engine = TransitionEngine::new(fakes.encoder.as_ref(), fakes.root());

        let output = engine.apply(&scenes, input.clone(), false).await.unwrap();

        assert_eq!(
            output,
            vec![
                fakes.root().join("transition_0.mp4"),
                fakes.root().join("transition_2.mp4"),
            ]
        );
        assert!(output.iter().all(|p| !input.contains(p)));

        let calls = fakes.encoder.transitions();
        assert_eq!(calls.len(), 2);
        // Highest index first.
        assert_eq!(calls[0].first, input[2]);
        assert_eq!(calls[0].second, input[3]);
        assert_eq!(calls[0].offset, 4.5);
        assert_eq!(calls[1].first, input[0]);
        assert_eq!(calls[1].second, input[1]);
        assert_eq!(calls[1].offset, 4.0);
    }

    #[tokio::test]
    async fn test_chained_transitions_fold_into_one_clip() {
        let fakes = Fakes::new();
        let scenes = vec![
            with_transition(text_scene("s0", 3.0), TransitionKind::Fade, 1.0),
            with_transition(text_scene("s1", 3.0), TransitionKind::Wipe, 1.0),
            text_scene("s2", 3.0),
        ];
        let input = clips(&fakes, &[3.0, 3.0, 3.0]).await;
        let engine = TransitionEngine::new(fakes.encoder.as_ref(), fakes.root());

        let output = engine.apply(&scenes, input.clone(), true).await.unwrap();

        assert_eq!(output, vec![fakes.root().join("transition_0.mp4")]);
        let calls = fakes.encoder.transitions();
        assert_eq!(calls[1].first, input[0]);
        assert_eq!(calls[1].second, fakes.root().join("transition_1.mp4"));
        assert!(calls.iter().all(|c| c.with_audio));
    }

    #[tokio::test]
    async fn test_offset_clamped_at_zero() {
        let fakes = Fakes::new();
        let scenes = vec![
            with_transition(text_scene("s0", 0.5), TransitionKind::Fade, 2.0),
            text_scene("s1", 3.0),
        ];
        let input = clips(&fakes, &[0.5, 3.0]).await;
        let engine = TransitionEngine::new(fakes.encoder.as_ref(), fakes.root());

        engine.apply(&scenes, input, false).await.unwrap();
        assert_eq!(fakes.encoder.transitions()[0].offset, 0.0);
    }

    #[tokio::test]
    async fn test_no_transitions_is_identity() {
        let fakes = Fakes::new();
        let scenes = vec![text_scene("s0", 1.0), text_scene("s1", 1.0)];
        let input = clips(&fakes, &[1.0, 1.0]).await;
        let engine = TransitionEngine::new(fakes.encoder.as_ref(), fakes.root());

        assert_eq!(engine.apply(&scenes, input.clone(), false).await.unwrap(), input);
        assert!(fakes.encoder.transitions().is_empty());
    }
}
