//! Render pipeline orchestrator.
//!
//! Phases, in order: load, prepare, narrate, render scenes, normalize audio,
//! transitions, concatenate, mix music. Cleanup of the scratch directory
//! runs after any outcome. Only narration failures are tolerated; every other
//! error aborts the render.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use kumiki_media::fs_utils::{ensure_parent, remove_dir_if_exists};
use kumiki_media::{move_file, MusicMix};
use kumiki_models::{validate_project, Project, Resolution, Scene};
use tokio::fs;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn, Instrument};

use crate::config::RenderOptions;
use crate::error::{RenderError, RenderResult};
use crate::factory::SceneFactory;
use crate::logging::RenderLogger;
use crate::metrics;
use crate::narration::{NarrationAudio, NarrationProcessor};
use crate::scenes::SceneContext;
use crate::services::Services;
use crate::sources;
use crate::transitions::TransitionEngine;

/// Share of progress spent rendering scenes.
const SCENE_PROGRESS: f64 = 80.0;
/// Share of progress spent concatenating.
const CONCAT_PROGRESS: f64 = 15.0;

/// Summary of a finished render.
#[derive(Debug, Clone)]
pub struct RenderOutcome {
    pub output: PathBuf,
    pub scenes: usize,
    pub narrated_scenes: usize,
    /// Clips passed to concatenation after transitions.
    pub concatenated_clips: Vec<PathBuf>,
    pub has_music: bool,
    /// Expected timeline length after transition overlaps.
    pub duration: f64,
}

/// Drives one project through every render phase.
#[derive(Debug, Clone)]
pub struct Renderer {
    services: Services,
    factory: SceneFactory,
}

impl Renderer {
    pub fn new(services: Services) -> Self {
        Self {
            services,
            factory: SceneFactory::default(),
        }
    }

    pub fn with_factory(mut self, factory: SceneFactory) -> Self {
        self.factory = factory;
        self
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    /// Read a project file, resolve its relative paths against the file's
    /// directory and render it.
    pub async fn render_file(
        &self,
        project_path: &Path,
        options: &RenderOptions,
    ) -> RenderResult<RenderOutcome> {
        let project = load_project(project_path).await?;
        let project_ref = project_path.display().to_string();
        self.render(&project, Some(&project_ref), options).await
    }

    /// Render `project` into `options.output`.
    pub async fn render(
        &self,
        project: &Project,
        project_ref: Option<&str>,
        options: &RenderOptions,
    ) -> RenderResult<RenderOutcome> {
        let started = Instant::now();
        let render_id = uuid::Uuid::new_v4().simple().to_string();
        let logger = RenderLogger::new(&render_id[..8], "render");

        logger.log_start(&format!(
            "{} scenes -> {}",
            project.scenes.len(),
            options.output.display()
        ));

        let result = async {
            let resolution = self.load(project).await?;
            let work_dir = options.temp_dir.join(format!("render-{}", logger.render_id()));
            fs::create_dir_all(&work_dir).await?;

            let outcome = self
                .run_phases(project, project_ref, options, resolution, &work_dir, &logger)
                .await;
            self.cleanup(options, &work_dir, &logger).await;
            outcome
        }
        .instrument(logger.create_span())
        .await;

        let elapsed = started.elapsed().as_secs_f64();
        metrics::record_render(result.is_ok(), elapsed);
        match &result {
            Ok(outcome) => logger.log_completion(&format!(
                "{} in {:.1}s",
                outcome.output.display(),
                elapsed
            )),
            Err(e) => logger.log_error(&format!("[{}] {}", e.code(), e)),
        }
        result
    }

    /// Encoder present, project structurally valid, resolution parseable.
    async fn load(&self, project: &Project) -> RenderResult<Resolution> {
        let version = self.services.encoder.version().await?;
        debug!(encoder = %version, "Encoder available");

        // A malformed resolution is fatal on its own, ahead of other issues.
        let resolution = project.settings.resolution()?;

        let issues = validate_project(project);
        if !issues.is_empty() {
            return Err(RenderError::Validation(issues));
        }
        Ok(resolution)
    }

    async fn run_phases(
        &self,
        project: &Project,
        project_ref: Option<&str>,
        options: &RenderOptions,
        resolution: Resolution,
        work_dir: &Path,
        logger: &RenderLogger,
    ) -> RenderResult<RenderOutcome> {
        let narrations = NarrationProcessor::new(
            &self.services,
            project.narration_defaults(),
            project_ref,
        )
        .process(project, &logger.child("narration"))
        .await;
        logger.log_progress(&format!(
            "narration ready for {} of {} scenes",
            narrations.len(),
            project.scenes.iter().filter(|s| s.narration.is_some()).count()
        ));

        let clips = self
            .render_scenes(project, project_ref, options, resolution, work_dir, &narrations)
            .await?;
        logger.log_progress(&format!("{} scenes rendered", clips.len()));

        let (clips, has_audio) = self.normalize_audio(clips, work_dir).await?;

        let clips = TransitionEngine::new(self.services.encoder.as_ref(), work_dir)
            .apply(&project.scenes, clips, has_audio)
            .await?;

        let duration = timeline_duration(&project.scenes);
        let combined = work_dir.join("combined.mp4");
        let progress = options.progress.clone();
        self.services
            .encoder
            .concat(
                &clips,
                &combined,
                duration,
                Some(Box::new(move |pct| {
                    if let Some(progress) = &progress {
                        progress(SCENE_PROGRESS + pct.clamp(0.0, 100.0) * CONCAT_PROGRESS / 100.0);
                    }
                })),
            )
            .await?;
        options.report(SCENE_PROGRESS + CONCAT_PROGRESS);
        logger.log_progress(&format!("{} clips concatenated", clips.len()));

        ensure_parent(&options.output).await?;
        let has_music = match project.background_music() {
            Some(music) => {
                let source = sources::resolve_music(
                    &self.services,
                    &music.src,
                    project.total_duration(),
                    options.music_lead_out,
                    project_ref,
                )
                .await?;
                let mix = MusicMix {
                    volume: project.music_volume(),
                    fade_in: music.fade_in,
                    fade_out: music.fade_out,
                    total_duration: duration,
                    keep_existing_audio: has_audio,
                };
                info!(
                    music = %source.display(),
                    volume = mix.volume,
                    keep_existing_audio = has_audio,
                    "Mixing background music"
                );
                self.services
                    .encoder
                    .mix_music(&combined, &source, &options.output, &mix)
                    .await?;
                true
            }
            None => {
                move_file(&combined, &options.output).await?;
                false
            }
        };
        options.report(100.0);

        Ok(RenderOutcome {
            output: options.output.clone(),
            scenes: project.scenes.len(),
            narrated_scenes: narrations.len(),
            concatenated_clips: clips,
            has_music,
            duration,
        })
    }

    /// Render every scene under the concurrency limit. Results land at their
    /// scene's index, so clip order never depends on completion order.
    async fn render_scenes(
        &self,
        project: &Project,
        project_ref: Option<&str>,
        options: &RenderOptions,
        resolution: Resolution,
        work_dir: &Path,
        narrations: &HashMap<String, NarrationAudio>,
    ) -> RenderResult<Vec<PathBuf>> {
        let total = project.scenes.len();
        let semaphore = Arc::new(Semaphore::new(options.concurrency.max(1)));
        let completed = AtomicUsize::new(0);

        let futures: Vec<_> = project
            .scenes
            .iter()
            .enumerate()
            .map(|(index, scene)| {
                let semaphore = semaphore.clone();
                let completed = &completed;
                let ctx = SceneContext {
                    scene: scene.clone(),
                    index,
                    resolution,
                    fps: project.settings.fps,
                    work_dir: work_dir.join(format!("scene_{:03}", index)),
                    services: self.services.clone(),
                    project_ref: project_ref.map(str::to_string),
                    narration_defaults: project.narration_defaults().cloned(),
                    narration: None,
                };
                let narration = narrations.get(&scene.id).map(|n| n.path.clone());

                async move {
                    let _permit = semaphore
                        .acquire()
                        .await
                        .map_err(|e| RenderError::Task(e.to_string()))?;
                    let path = self.render_scene(ctx, narration, total).await?;

                    let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                    options.report(done as f64 / total as f64 * SCENE_PROGRESS);
                    Ok::<_, RenderError>((index, path))
                }
            })
            .collect();

        let mut clips: Vec<Option<PathBuf>> = vec![None; total];
        for result in join_all(futures).await {
            let (index, path) = result?;
            clips[index] = Some(path);
        }

        clips
            .into_iter()
            .enumerate()
            .map(|(index, clip)| {
                clip.ok_or_else(|| RenderError::Task(format!("scene {} produced no clip", index)))
            })
            .collect()
    }

    async fn render_scene(
        &self,
        ctx: SceneContext,
        narration: Option<PathBuf>,
        total: usize,
    ) -> RenderResult<PathBuf> {
        let started = Instant::now();
        let (index, id, kind) = (ctx.index, ctx.scene.id.clone(), ctx.scene.kind());
        info!(
            scene_id = %id,
            kind = %kind,
            "Rendering scene {}/{}",
            index + 1,
            total
        );

        let mut renderer = self.factory.create(ctx)?;
        if let Some(audio) = narration {
            renderer.set_narration(audio);
        }
        let path = renderer.render_video().await?;

        metrics::record_scene(kind.as_str(), started.elapsed().as_secs_f64());
        info!(scene_id = %id, path = %path.display(), "Scene rendered");
        Ok(path)
    }

    /// Give silent tracks to audio-less clips when any clip has audio, so
    /// every clip has the same stream layout. Returns whether audio exists.
    async fn normalize_audio(
        &self,
        clips: Vec<PathBuf>,
        work_dir: &Path,
    ) -> RenderResult<(Vec<PathBuf>, bool)> {
        let encoder = &self.services.encoder;
        let mut has_audio = Vec::with_capacity(clips.len());
        for clip in &clips {
            has_audio.push(encoder.probe(clip).await?.has_audio);
        }

        if !has_audio.iter().any(|a| *a) {
            return Ok((clips, false));
        }

        let mut normalized = Vec::with_capacity(clips.len());
        for (index, (clip, audio)) in clips.into_iter().zip(has_audio).enumerate() {
            if audio {
                normalized.push(clip);
                continue;
            }
            let output = work_dir.join(format!("silent_{:03}.mp4", index));
            encoder.add_silent_audio(&clip, &output).await?;
            debug!(index, "Added silent track");
            normalized.push(output);
        }
        Ok((normalized, true))
    }

    async fn cleanup(&self, options: &RenderOptions, work_dir: &Path, logger: &RenderLogger) {
        if options.keep_temp {
            logger.log_progress(&format!("keeping temp files in {}", work_dir.display()));
            return;
        }
        if let Err(e) = remove_dir_if_exists(work_dir).await {
            warn!(path = %work_dir.display(), "Failed to remove temp directory: {}", e);
        }
        // Only succeeds when no other render is using the parent.
        match fs::remove_dir(&options.temp_dir).await {
            Ok(()) => debug!(path = %options.temp_dir.display(), "Removed temp root"),
            Err(e)
                if matches!(
                    e.kind(),
                    std::io::ErrorKind::NotFound | std::io::ErrorKind::DirectoryNotEmpty
                ) => {}
            Err(e) => {
                debug!(path = %options.temp_dir.display(), "Temp root left in place: {}", e)
            }
        }
    }
}

/// Parse a project file and make its paths absolute.
pub async fn load_project(path: &Path) -> RenderResult<Project> {
    let text = fs::read_to_string(path)
        .await
        .map_err(|e| RenderError::Parse(format!("{}: {}", path.display(), e)))?;
    let mut project = Project::from_json(&text)?;

    let base = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(dir) => dir.to_path_buf(),
        None => std::env::current_dir()?,
    };
    let base = fs::canonicalize(&base).await.unwrap_or(base);
    project.resolve_paths(&base);
    Ok(project)
}

/// Sum of scene durations minus transition overlaps.
pub fn timeline_duration(scenes: &[Scene]) -> f64 {
    let total: f64 = scenes.iter().map(|s| s.duration).sum();
    let overlap: f64 = scenes
        .iter()
        .take(scenes.len().saturating_sub(1))
        .filter_map(|s| s.transition.as_ref())
        .map(|t| t.duration.max(0.0))
        .sum();
    (total - overlap).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RenderConfig;
    use crate::testing::{narrated, project, scene, text_scene, with_transition, Fakes};
    use kumiki_media::Encoder;
    use kumiki_models::{
        AudioSettings, BackgroundMusic, ImageContent, ImageSource, MusicSource, SceneBody,
        TransitionKind,
    };
    use std::sync::Mutex;
    use std::time::Duration;

    fn options(fakes: &Fakes) -> RenderOptions {
        RenderOptions::new(fakes.root().join("out/final.mp4"), &RenderConfig::default())
    }

    fn scene_dir(clip: &Path) -> String {
        clip.parent()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    #[test]
    fn test_timeline_duration_subtracts_overlaps() {
        let scenes = vec![
            with_transition(text_scene("a", 5.0), TransitionKind::Fade, 1.0),
            text_scene("b", 10.0),
            // Trailing transition has no successor.
            with_transition(text_scene("c", 5.0), TransitionKind::Fade, 1.0),
        ];
        assert_eq!(timeline_duration(&scenes), 19.0);
        assert_eq!(timeline_duration(&[]), 0.0);
    }

    #[tokio::test]
    async fn test_clip_order_survives_out_of_order_completion() {
        let fakes = Fakes::new();
        let delays = [80, 5, 50, 0, 30];
        for (i, ms) in delays.iter().enumerate() {
            fakes
                .encoder
                .delay_scene(&format!("scene_{:03}", i), Duration::from_millis(*ms));
        }
        let scenes = (0..delays.len())
            .map(|i| text_scene(&format!("s{}", i), 1.0))
            .collect();
        let renderer = Renderer::new(fakes.services());

        let outcome = renderer
            .render(&project(scenes), None, &options(&fakes).with_concurrency(2))
            .await
            .unwrap();

        let concats = fakes.encoder.concats();
        assert_eq!(concats.len(), 1);
        let dirs: Vec<String> = concats[0].iter().map(|c| scene_dir(c)).collect();
        assert_eq!(
            dirs,
            vec!["scene_000", "scene_001", "scene_002", "scene_003", "scene_004"]
        );
        assert!(fakes.encoder.max_in_flight() <= 2);
        assert_eq!(outcome.scenes, 5);
        assert!(outcome.output.exists());
    }

    #[tokio::test]
    async fn test_narration_failure_does_not_abort() {
        let fakes = Fakes::new();
        let project = project(vec![
            narrated(text_scene("a", 2.0), "hello"),
            narrated(text_scene("b", 2.0), "FAIL"),
            narrated(text_scene("c", 2.0), "goodbye"),
        ]);

        let outcome = Renderer::new(fakes.services())
            .render(&project, None, &options(&fakes))
            .await
            .unwrap();

        assert_eq!(outcome.narrated_scenes, 2);
        assert_eq!(fakes.encoder.narration_mixes().len(), 2);
        // Scene b got a silent track so every clip has audio.
        let inputs = &fakes.encoder.concats()[0];
        assert_eq!(inputs.len(), 3);
        assert!(inputs[0].ends_with("scene_000/narrated.mp4"));
        assert!(inputs[1].ends_with("silent_001.mp4"));
        assert!(inputs[2].ends_with("scene_002/narrated.mp4"));
    }

    #[tokio::test]
    async fn test_transitions_leave_no_unmerged_clips() {
        let fakes = Fakes::new();
        let project = project(vec![
            with_transition(text_scene("s0", 3.0), TransitionKind::Fade, 1.0),
            text_scene("s1", 3.0),
            with_transition(text_scene("s2", 3.0), TransitionKind::Wipe, 1.0),
            text_scene("s3", 3.0),
        ]);

        let outcome = Renderer::new(fakes.services())
            .render(&project, None, &options(&fakes))
            .await
            .unwrap();

        let inputs = &fakes.encoder.concats()[0];
        assert_eq!(inputs.len(), 2);
        assert!(inputs[0].ends_with("transition_0.mp4"));
        assert!(inputs[1].ends_with("transition_2.mp4"));
        assert_eq!(outcome.duration, 10.0);
    }

    #[tokio::test]
    async fn test_three_scenes_with_music() {
        let fakes = Fakes::new();
        let music = fakes.root().join("bgm.mp3");
        fs::write(&music, b"mp3").await.unwrap();
        let mut project = project(vec![
            text_scene("intro", 5.0),
            text_scene("body", 10.0),
            text_scene("outro", 5.0),
        ]);
        project.audio = Some(AudioSettings {
            background_music: Some(BackgroundMusic {
                src: MusicSource::Path(music),
                volume: 0.5,
                fade_in: Some(1.0),
                fade_out: None,
            }),
        });
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let options = options(&fakes).with_progress(move |p| sink.lock().unwrap().push(p));

        let outcome = Renderer::new(fakes.services())
            .render(&project, None, &options)
            .await
            .unwrap();

        assert!(outcome.has_music);
        let mixes = fakes.encoder.music_mixes();
        assert_eq!(mixes.len(), 1);
        assert_eq!(mixes[0].volume, 0.5);
        assert_eq!(mixes[0].total_duration, 20.0);
        assert!(!mixes[0].keep_existing_audio);
        assert_eq!(
            fakes.encoder.probe(&outcome.output).await.unwrap().duration,
            20.0
        );

        let seen = seen.lock().unwrap();
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(seen.last(), Some(&100.0));
        assert!(seen.contains(&95.0));
    }

    #[tokio::test]
    async fn test_generated_music_uses_timeline_plus_lead_out() {
        let fakes = Fakes::new();
        let mut project = project(vec![text_scene("a", 4.0), text_scene("b", 6.0)]);
        project.audio = Some(AudioSettings {
            background_music: Some(BackgroundMusic {
                src: MusicSource::Generate(
                    kumiki_models::MusicGenerationParams::from_prompt("koto").unwrap(),
                ),
                volume: 0.3,
                fade_in: None,
                fade_out: None,
            }),
        });

        Renderer::new(fakes.services())
            .render(&project, None, &options(&fakes))
            .await
            .unwrap();

        assert_eq!(fakes.music.durations(), vec![15.0]);
    }

    #[tokio::test]
    async fn test_invalid_project_fails_before_work_dir() {
        let fakes = Fakes::new();
        let project = project(vec![text_scene("dup", 1.0), text_scene("dup", 1.0)]);
        let options = options(&fakes);

        let err = Renderer::new(fakes.services())
            .render(&project, None, &options)
            .await
            .unwrap_err();

        assert_eq!(err.code(), "VALIDATION_ERROR");
        assert!(err.to_string().contains("DUPLICATE_ID"));
        assert!(!options.temp_dir.exists());
    }

    #[tokio::test]
    async fn test_malformed_resolution_is_fatal() {
        let fakes = Fakes::new();
        let mut project = project(vec![text_scene("a", 1.0)]);
        project.settings.resolution = "1280by720".to_string();
        let options = options(&fakes);

        let err = Renderer::new(fakes.services())
            .render(&project, None, &options)
            .await
            .unwrap_err();

        assert_eq!(err.code(), "INVALID_RESOLUTION");
        assert!(err.to_string().contains("1280by720"));
        assert!(!options.temp_dir.exists());
    }

    #[tokio::test]
    async fn test_missing_encoder_aborts_before_scratch_dir() {
        let fakes = Fakes::new();
        fakes.encoder.uninstall();
        let options = options(&fakes);
        fs::create_dir_all(&options.temp_dir).await.unwrap();

        let err = Renderer::new(fakes.services())
            .render(&project(vec![text_scene("a", 1.0)]), None, &options)
            .await
            .unwrap_err();

        assert_eq!(err.code(), "FFMPEG_NOT_FOUND");
        let mut entries = fs::read_dir(&options.temp_dir).await.unwrap();
        assert!(entries.next_entry().await.unwrap().is_none());
        assert!(fakes.markup.pages().is_empty());
    }

    #[tokio::test]
    async fn test_scene_failure_aborts_and_cleans_up() {
        let fakes = Fakes::new();
        let project = project(vec![
            text_scene("ok", 1.0),
            scene(
                "broken",
                1.0,
                SceneBody::Image {
                    content: ImageContent {
                        src: ImageSource::Path(fakes.root().join("missing.png")),
                        fit: Default::default(),
                        position: Default::default(),
                    },
                },
            ),
        ]);
        let options = options(&fakes);

        let err = Renderer::new(fakes.services())
            .render(&project, None, &options)
            .await
            .unwrap_err();

        assert_eq!(err.code(), "MISSING_ASSET");
        assert!(!options.temp_dir.exists());
        assert!(!options.output.exists());
    }

    #[tokio::test]
    async fn test_keep_temp_leaves_scratch_files() {
        let fakes = Fakes::new();
        let options = options(&fakes).keep_temp(true);

        Renderer::new(fakes.services())
            .render(&project(vec![text_scene("a", 1.0)]), None, &options)
            .await
            .unwrap();

        let mut entries = fs::read_dir(&options.temp_dir).await.unwrap();
        let entry = entries.next_entry().await.unwrap().unwrap();
        assert!(entry.file_name().to_string_lossy().starts_with("render-"));
        assert!(entry.path().join("scene_000/clip.mp4").exists());
    }

    #[tokio::test]
    async fn test_load_project_resolves_relative_paths() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("demo.json");
        fs::write(
            &path,
            r#"{
                "settings": {"resolution": "1280x720", "fps": 30},
                "scenes": [{"id": "v", "type": "video", "duration": 3,
                            "content": {"src": "clips/a.mp4"}}]
            }"#,
        )
        .await
        .unwrap();

        let project = load_project(&path).await.unwrap();
        match &project.scenes[0].body {
            SceneBody::Video { content } => {
                assert!(content.src.is_absolute());
                assert!(content.src.ends_with("clips/a.mp4"));
            }
            other => panic!("unexpected body {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_load_project_reports_parse_errors() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "{ nope").await.unwrap();

        let err = load_project(&path).await.unwrap_err();
        assert_eq!(err.code(), "PARSE_ERROR");

        let err = load_project(&dir.path().join("missing.json")).await.unwrap_err();
        assert_eq!(err.code(), "PARSE_ERROR");
    }
}
