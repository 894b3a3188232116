//! Linked eSpeak NG engine (feature `espeak`).
//!
//! libespeak-ng keeps its state in process globals, so at most one
//! [`EspeakEngine`] may exist at a time. The engine runs in synchronous mode:
//! every callback for a request is delivered on the calling thread before
//! `espeak_Synth` returns.

use crate::config::{Gender, VoiceConfig};
use crate::error::{Result, TalkboxError};
use crate::speech::engine::{
    BoundaryEvent, BoundaryKind, ChunkControl, SynthSink, SynthesisEngine,
};
use std::ffi::{CString, c_char, c_int, c_short, c_uchar, c_uint, c_void};
use std::marker::PhantomData;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};

const AUDIO_OUTPUT_SYNCHRONOUS: c_int = 2;
const POS_CHARACTER: c_int = 1;
const CHARS_UTF8: c_uint = 1;

const EVENT_LIST_TERMINATED: c_int = 0;
const EVENT_WORD: c_int = 1;
const EVENT_SENTENCE: c_int = 2;
const EVENT_END: c_int = 5;

const PARAM_RATE: c_int = 1;
const PARAM_PITCH: c_int = 3;

const EE_OK: c_int = 0;

// Mirrors espeak_EVENT; only some fields are read.
#[allow(dead_code)]
#[repr(C)]
struct EspeakEvent {
    kind: c_int,
    unique_identifier: c_uint,
    text_position: c_int,
    length: c_int,
    /// Milliseconds from the start of the utterance
    audio_position: c_int,
    sample: c_int,
    user_data: *mut c_void,
    id: EventId,
}

#[allow(dead_code)]
#[repr(C)]
union EventId {
    number: c_int,
    name: *const c_char,
    string: [c_char; 8],
}

#[allow(dead_code)]
#[repr(C)]
struct EspeakVoice {
    name: *const c_char,
    languages: *const c_char,
    identifier: *const c_char,
    gender: c_uchar,
    age: c_uchar,
    variant: c_uchar,
    xx1: c_uchar,
    score: c_int,
    spare: *mut c_void,
}

type SynthCallback = extern "C" fn(*mut c_short, c_int, *mut EspeakEvent) -> c_int;

unsafe extern "C" {
    fn espeak_Initialize(
        output: c_int,
        buflength: c_int,
        path: *const c_char,
        options: c_int,
    ) -> c_int;
    fn espeak_SetSynthCallback(callback: SynthCallback);
    fn espeak_SetVoiceByProperties(voice: *mut EspeakVoice) -> c_int;
    fn espeak_SetParameter(parameter: c_int, value: c_int, relative: c_int) -> c_int;
    fn espeak_Synth(
        text: *const c_void,
        size: usize,
        position: c_uint,
        position_type: c_int,
        end_position: c_uint,
        flags: c_uint,
        unique_identifier: *mut c_uint,
        user_data: *mut c_void,
    ) -> c_int;
    fn espeak_Synchronize() -> c_int;
    fn espeak_Terminate() -> c_int;
}

static ENGINE_ACTIVE: AtomicBool = AtomicBool::new(false);

/// Text-to-speech through the linked libespeak-ng.
pub struct EspeakEngine {
    sample_rate: u32,
    // Bound to the thread that initialized the library.
    _not_send: PhantomData<*const ()>,
}

impl EspeakEngine {
    /// Initialize libespeak-ng and select the configured voice.
    pub fn new(config: &VoiceConfig) -> Result<Self> {
        if ENGINE_ACTIVE.swap(true, Ordering::SeqCst) {
            return Err(TalkboxError::EngineInit {
                message: "libespeak-ng is already in use by another engine".to_string(),
            });
        }

        match Self::init(config) {
            Ok(engine) => Ok(engine),
            Err(e) => {
                ENGINE_ACTIVE.store(false, Ordering::SeqCst);
                Err(e)
            }
        }
    }

    fn init(config: &VoiceConfig) -> Result<Self> {
        let buflength = c_int::try_from(config.buffer_ms).unwrap_or(c_int::MAX);

        // SAFETY: a null path selects the default data directory.
        let sample_rate = unsafe {
            espeak_Initialize(AUDIO_OUTPUT_SYNCHRONOUS, buflength, std::ptr::null(), 0)
        };
        if sample_rate <= 0 {
            return Err(TalkboxError::EngineInit {
                message: "espeak_Initialize failed (is espeak-ng-data installed?)".to_string(),
            });
        }

        // SAFETY: the callback is a plain extern fn with a 'static lifetime.
        unsafe { espeak_SetSynthCallback(synth_callback) };

        let engine = Self {
            sample_rate: sample_rate as u32,
            _not_send: PhantomData,
        };

        engine.select_voice(config)?;
        engine.set_parameter(PARAM_RATE, config.rate, "rate")?;
        engine.set_parameter(PARAM_PITCH, config.pitch, "pitch")?;

        tracing::info!(
            voice = %config.name,
            language = %config.language,
            sample_rate = engine.sample_rate,
            "libespeak-ng initialized"
        );
        Ok(engine)
    }

    fn select_voice(&self, config: &VoiceConfig) -> Result<()> {
        let name = cstring(&config.name)?;
        let language = cstring(&config.language)?;

        let mut voice = EspeakVoice {
            name: if config.name.is_empty() {
                std::ptr::null()
            } else {
                name.as_ptr()
            },
            languages: language.as_ptr(),
            identifier: std::ptr::null(),
            gender: match config.gender {
                Gender::None => 0,
                Gender::Male => 1,
                Gender::Female => 2,
            },
            age: config.age,
            variant: config.variant,
            xx1: 0,
            score: 0,
            spare: std::ptr::null_mut(),
        };

        // SAFETY: the strings outlive the call; the library copies what it keeps.
        let status = unsafe { espeak_SetVoiceByProperties(&mut voice) };
        if status != EE_OK {
            return Err(TalkboxError::EngineInit {
                message: format!(
                    "no voice matches name '{}' language '{}'",
                    config.name, config.language
                ),
            });
        }
        Ok(())
    }

    fn set_parameter(&self, parameter: c_int, value: u32, label: &str) -> Result<()> {
        let value = c_int::try_from(value).unwrap_or(c_int::MAX);
        // SAFETY: plain value call into an initialized library.
        let status = unsafe { espeak_SetParameter(parameter, value, 0) };
        if status != EE_OK {
            return Err(TalkboxError::EngineInit {
                message: format!("failed to set {} to {}", label, value),
            });
        }
        Ok(())
    }
}

impl SynthesisEngine for EspeakEngine {
    fn synthesize(&mut self, text: &str, sink: &mut dyn SynthSink) -> Result<()> {
        let text = CString::new(text)
            .map_err(|_| TalkboxError::engine("text contains a NUL byte"))?;
        let size = text.as_bytes_with_nul().len();

        let mut sink: &mut dyn SynthSink = sink;
        let user_data = &mut sink as *mut &mut dyn SynthSink as *mut c_void;
        let mut uid: c_uint = 0;

        // SAFETY: synchronous mode delivers every callback before espeak_Synth
        // returns, so `user_data` points at a live sink for the whole call.
        let status = unsafe {
            espeak_Synth(
                text.as_ptr() as *const c_void,
                size,
                0,
                POS_CHARACTER,
                0,
                CHARS_UTF8,
                &mut uid,
                user_data,
            )
        };

        if status != EE_OK {
            return Err(TalkboxError::engine(format!(
                "espeak_Synth failed with status {}",
                status
            )));
        }
        Ok(())
    }

    fn synchronize(&mut self) -> Result<()> {
        // SAFETY: no arguments; blocks until pending synthesis is delivered.
        let status = unsafe { espeak_Synchronize() };
        if status != EE_OK {
            return Err(TalkboxError::engine(format!(
                "espeak_Synchronize failed with status {}",
                status
            )));
        }
        Ok(())
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn name(&self) -> &str {
        "espeak-ng"
    }
}

impl Drop for EspeakEngine {
    fn drop(&mut self) {
        // SAFETY: this engine owns the library state.
        unsafe {
            espeak_Terminate();
        }
        ENGINE_ACTIVE.store(false, Ordering::SeqCst);
    }
}

fn cstring(value: &str) -> Result<CString> {
    CString::new(value).map_err(|_| TalkboxError::EngineInit {
        message: format!("'{}' contains a NUL byte", value.escape_debug()),
    })
}

fn boundary_kind(kind: c_int) -> BoundaryKind {
    match kind {
        EVENT_WORD => BoundaryKind::Word,
        EVENT_SENTENCE => BoundaryKind::Sentence,
        EVENT_END => BoundaryKind::End,
        _ => BoundaryKind::Other,
    }
}

/// Returns 0 to continue synthesis and 1 to abort.
extern "C" fn synth_callback(
    wav: *mut c_short,
    numsamples: c_int,
    events: *mut EspeakEvent,
) -> c_int {
    // SAFETY: pointers come straight from libespeak-ng for this callback.
    let control = std::panic::catch_unwind(AssertUnwindSafe(|| unsafe {
        dispatch(wav, numsamples, events)
    }));

    match control {
        Ok(ChunkControl::Continue) => 0,
        Ok(ChunkControl::Stop) => 1,
        Err(_) => {
            tracing::error!("synthesis callback panicked, aborting utterance");
            1
        }
    }
}

/// # Safety
/// `events` must be null or a terminated event list from libespeak-ng whose
/// `user_data` was set by [`EspeakEngine::synthesize`]. `wav` must be null or
/// valid for `numsamples` samples.
unsafe fn dispatch(wav: *mut c_short, numsamples: c_int, events: *mut EspeakEvent) -> ChunkControl {
    if events.is_null() {
        return ChunkControl::Stop;
    }

    let user_data = unsafe { (*events).user_data } as *mut &mut dyn SynthSink;
    if user_data.is_null() {
        return ChunkControl::Stop;
    }

    let mut boundaries = Vec::new();
    let mut cursor = events;
    loop {
        let event = unsafe { &*cursor };
        if event.kind == EVENT_LIST_TERMINATED {
            break;
        }
        boundaries.push(BoundaryEvent::new(
            boundary_kind(event.kind),
            event.audio_position.max(0) as u64,
        ));
        cursor = unsafe { cursor.add(1) };
    }

    let samples: &[i16] = if wav.is_null() || numsamples <= 0 {
        &[]
    } else {
        unsafe { std::slice::from_raw_parts(wav, numsamples as usize) }
    };

    let sink = unsafe { &mut **user_data };
    sink.on_chunk(samples, &boundaries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_kinds_map_to_boundaries() {
        assert_eq!(boundary_kind(EVENT_WORD), BoundaryKind::Word);
        assert_eq!(boundary_kind(EVENT_SENTENCE), BoundaryKind::Sentence);
        assert_eq!(boundary_kind(EVENT_END), BoundaryKind::End);
        assert_eq!(boundary_kind(7), BoundaryKind::Other);
    }

    struct Collect(Vec<(usize, Vec<BoundaryEvent>)>);

    impl SynthSink for Collect {
        fn on_chunk(&mut self, samples: &[i16], events: &[BoundaryEvent]) -> ChunkControl {
            self.0.push((samples.len(), events.to_vec()));
            if samples.is_empty() {
                ChunkControl::Stop
            } else {
                ChunkControl::Continue
            }
        }
    }

    fn event(kind: c_int, audio_position: c_int, user_data: *mut c_void) -> EspeakEvent {
        EspeakEvent {
            kind,
            unique_identifier: 1,
            text_position: 0,
            length: 0,
            audio_position,
            sample: 0,
            user_data,
            id: EventId { number: 0 },
        }
    }

    #[test]
    fn callback_routes_through_user_data() {
        let mut collect = Collect(Vec::new());
        let mut sink: &mut dyn SynthSink = &mut collect;
        let user_data = &mut sink as *mut &mut dyn SynthSink as *mut c_void;

        let mut samples = vec![5i16; 8];
        let mut events = vec![
            event(EVENT_WORD, 0, user_data),
            event(EVENT_END, 120, user_data),
            event(EVENT_LIST_TERMINATED, 0, user_data),
        ];
        assert_eq!(synth_callback(samples.as_mut_ptr(), 8, events.as_mut_ptr()), 0);

        let mut end = vec![event(EVENT_LIST_TERMINATED, 0, user_data)];
        assert_eq!(synth_callback(std::ptr::null_mut(), 0, end.as_mut_ptr()), 1);

        assert_eq!(collect.0.len(), 2);
        assert_eq!(
            collect.0[0],
            (8, vec![BoundaryEvent::word(0), BoundaryEvent::end(120)])
        );
        assert_eq!(collect.0[1], (0, vec![]));
    }

    #[test]
    fn callback_without_events_aborts() {
        assert_eq!(synth_callback(std::ptr::null_mut(), 0, std::ptr::null_mut()), 1);
    }

    #[test]
    #[ignore = "requires libespeak-ng and its voice data"]
    fn speaks_with_word_events() {
        let mut engine = EspeakEngine::new(&VoiceConfig::default()).unwrap();
        let mut collect = Collect(Vec::new());
        engine.synthesize("hello world", &mut collect).unwrap();
        engine.synchronize().unwrap();

        let words = collect
            .0
            .iter()
            .flat_map(|(_, events)| events)
            .filter(|e| e.kind == BoundaryKind::Word)
            .count();
        assert_eq!(words, 2);
    }
}
