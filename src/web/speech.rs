//! Chinese text-to-speech through the browser's `speechSynthesis`.
//! Absent capability is a silent no-op.

use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{SpeechSynthesis, SpeechSynthesisUtterance, SpeechSynthesisVoice, window};

pub const SPEECH_LANG: &str = "zh-CN";
pub const SPEECH_RATE: f32 = 0.95;

/// Preferred voice among `(lang, name)` pairs: mainland Chinese first, then
/// any Chinese locale, then anything named Chinese.
pub fn pick_voice_index(voices: &[(String, String)]) -> Option<usize> {
    let lang = |l: &str| l.to_ascii_lowercase().replace('_', "-");
    voices
        .iter()
        .position(|(l, _)| lang(l).contains("zh-cn"))
        .or_else(|| voices.iter().position(|(l, _)| lang(l).starts_with("zh")))
        .or_else(|| {
            voices
                .iter()
                .position(|(_, n)| n.to_lowercase().contains("chinese"))
        })
}

pub struct Speech {
    synth: Option<SpeechSynthesis>,
    voice: Option<SpeechSynthesisVoice>,
    on_voices: Option<Closure<dyn FnMut()>>,
}

impl Speech {
    pub fn new() -> Self {
        let synth = window().and_then(|w| w.speech_synthesis().ok());
        if synth.is_none() {
            log::warn!("speechSynthesis unavailable; pronunciation disabled");
        }
        let mut speech = Self {
            synth,
            voice: None,
            on_voices: None,
        };
        speech.load_voices();
        speech
    }

    pub fn is_available(&self) -> bool {
        self.synth.is_some()
    }

    /// Re-resolve the preferred voice. Voices arrive asynchronously in some
    /// browsers, so this also runs on `voiceschanged`.
    pub fn load_voices(&mut self) {
        let Some(synth) = self.synth.as_ref() else {
            return;
        };
        let voices: Vec<SpeechSynthesisVoice> = synth
            .get_voices()
            .iter()
            .filter_map(|v| v.dyn_into::<SpeechSynthesisVoice>().ok())
            .collect();
        if voices.is_empty() {
            return;
        }
        let described: Vec<(String, String)> = voices.iter().map(|v| (v.lang(), v.name())).collect();
        self.voice = pick_voice_index(&described).map(|i| voices[i].clone());
    }

    /// Hook `voiceschanged` to `on_change`, replacing any earlier hook.
    pub fn watch_voices(&mut self, on_change: impl FnMut() + 'static) {
        if let Some(synth) = self.synth.as_ref() {
            let closure = Closure::wrap(Box::new(on_change) as Box<dyn FnMut()>);
            synth.set_onvoiceschanged(Some(closure.as_ref().unchecked_ref()));
            self.on_voices = Some(closure);
        }
    }

    pub fn speak(&self, text: &str) {
        let Some(synth) = self.synth.as_ref() else {
            return;
        };
        if text.is_empty() {
            return;
        }
        let Ok(utterance) = SpeechSynthesisUtterance::new_with_text(text) else {
            return;
        };
        utterance.set_lang(SPEECH_LANG);
        if let Some(v) = self.voice.as_ref() {
            utterance.set_voice(Some(v));
        }
        utterance.set_rate(SPEECH_RATE);
        utterance.set_pitch(1.0);
        utterance.set_volume(1.0);
        synth.cancel();
        synth.speak(&utterance);
    }
}

impl Drop for Speech {
    fn drop(&mut self) {
        if let (Some(synth), Some(_)) = (self.synth.as_ref(), self.on_voices.take()) {
            synth.set_onvoiceschanged(None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(lang: &str, name: &str) -> (String, String) {
        (lang.to_string(), name.to_string())
    }

    #[test]
    fn prefers_mainland_voice() {
        let voices = [v("zh-TW", "Mei-Jia"), v("en-US", "Alex"), v("zh_CN", "Ting-Ting")];
        assert_eq!(pick_voice_index(&voices), Some(2));
    }

    #[test]
    fn mainland_tag_matches_anywhere_in_lang() {
        let voices = [v("zh-TW", "Mei-Jia"), v("cmn-ZH_cn", "Li-mu")];
        assert_eq!(pick_voice_index(&voices), Some(1));
    }

    #[test]
    fn falls_back_to_any_chinese_locale() {
        let voices = [v("en-US", "Alex"), v("zh-HK", "Sin-ji")];
        assert_eq!(pick_voice_index(&voices), Some(1));
    }

    #[test]
    fn falls_back_to_name() {
        let voices = [v("en-US", "Alex"), v("x-unknown", "Google Chinese")];
        assert_eq!(pick_voice_index(&voices), Some(1));
        assert_eq!(pick_voice_index(&[v("en-US", "Alex")]), None);
    }
}
