//! FFmpeg filter expressions.

use kumiki_models::{AnimationKind, Direction, Resolution, TransitionKind};

/// Volume applied to a video clip's own audio when narration is laid over it.
pub const ORIGINAL_AUDIO_UNDER_NARRATION: f64 = 0.3;

fn secs(value: f64) -> String {
    format!("{:.3}", value)
}

/// Scale to an exact frame size.
pub fn scale_exact(res: Resolution) -> String {
    format!("scale={}", res.as_filter_size())
}

/// Fit inside the frame preserving aspect ratio, padding with black.
pub fn letterbox(res: Resolution) -> String {
    let (w, h) = (res.width, res.height);
    format!(
        "scale={w}:{h}:force_original_aspect_ratio=decrease,pad={w}:{h}:(ow-iw)/2:(oh-ih)/2:black"
    )
}

/// Fade filter for an animation, clamped to the scene length.
pub fn animation_filter(kind: AnimationKind, duration: f64, scene_duration: f64) -> String {
    let d = duration.min(scene_duration).max(0.0);
    match kind {
        AnimationKind::FadeIn => format!("fade=t=in:st=0:d={}", secs(d)),
        AnimationKind::FadeOut => {
            let start = (scene_duration - d).max(0.0);
            format!("fade=t=out:st={}:d={}", secs(start), secs(d))
        }
    }
}

/// Name of the `xfade` transition for a transition kind.
pub fn xfade_transition_name(kind: TransitionKind, direction: Option<Direction>) -> &'static str {
    match kind {
        TransitionKind::Fade => "fade",
        TransitionKind::Dissolve => "dissolve",
        TransitionKind::Wipe => match direction.unwrap_or_default() {
            Direction::Left => "wipeleft",
            Direction::Right => "wiperight",
            Direction::Up => "wipeup",
            Direction::Down => "wipedown",
        },
    }
}

/// Cross-transition between inputs 0 and 1. Produces `[v]` and, when both
/// clips carry audio, `[a]`.
pub fn xfade_filter(name: &str, duration: f64, offset: f64, with_audio: bool) -> String {
    let mut graph = format!(
        "[0:v][1:v]xfade=transition={}:duration={}:offset={},format=yuv420p[v]",
        name,
        secs(duration),
        secs(offset.max(0.0))
    );
    if with_audio {
        graph.push_str(&format!(";[0:a][1:a]acrossfade=d={}[a]", secs(duration)));
    }
    graph
}

/// Audio chain placing narration (input 1) over a clip (input 0).
///
/// `original_volume` keeps the clip's own audio mixed underneath; `None`
/// means the clip is silent or its audio is dropped. Produces `[aout]`.
pub fn narration_filter(
    volume: f64,
    delay: f64,
    fade_in: f64,
    fade_out: f64,
    clip_duration: f64,
    original_volume: Option<f64>,
) -> String {
    let mut chain = vec![format!("volume={}", secs(volume))];
    if delay > 0.0 {
        let ms = (delay * 1000.0).round() as i64;
        chain.push(format!("adelay={}:all=1", ms));
    }
    if fade_in > 0.0 {
        chain.push(format!("afade=t=in:st={}:d={}", secs(delay.max(0.0)), secs(fade_in)));
    }
    if fade_out > 0.0 {
        let start = (clip_duration - fade_out).max(0.0);
        chain.push(format!("afade=t=out:st={}:d={}", secs(start), secs(fade_out)));
    }
    chain.push("apad".to_string());

    let narration = format!("[1:a]{}[narr]", chain.join(","));
    match original_volume {
        Some(v) => format!(
            "{};[0:a]volume={}[orig];[orig][narr]amix=inputs=2:duration=first:dropout_transition=0:normalize=0[aout]",
            narration,
            secs(v)
        ),
        None => format!("{};[narr]anull[aout]", narration),
    }
}

fn music_chain(volume: f64, fade_in: Option<f64>, fade_out: Option<f64>, total: f64) -> String {
    let mut chain = vec![format!("volume={}", secs(volume))];
    if let Some(d) = fade_in.filter(|d| *d > 0.0) {
        chain.push(format!("afade=t=in:st=0:d={}", secs(d)));
    }
    if let Some(d) = fade_out.filter(|d| *d > 0.0) {
        let start = (total - d).max(0.0);
        chain.push(format!("afade=t=out:st={}:d={}", secs(start), secs(d)));
    }
    chain.join(",")
}

/// Mix music (input 1) under the video's existing audio (input 0), keeping
/// the existing audio at full level. Produces `[aout]`.
pub fn music_mix_filter(volume: f64, fade_in: Option<f64>, fade_out: Option<f64>, total: f64) -> String {
    format!(
        "[1:a]{}[bgm];[0:a][bgm]amix=inputs=2:duration=first:dropout_transition=0:normalize=0[aout]",
        music_chain(volume, fade_in, fade_out, total)
    )
}

/// Music (input 1) as the only audio track, padded with silence so a short
/// track never cuts the video. Produces `[aout]`.
pub fn music_only_filter(volume: f64, fade_in: Option<f64>, fade_out: Option<f64>, total: f64) -> String {
    format!("[1:a]{},apad[aout]", music_chain(volume, fade_in, fade_out, total))
}
