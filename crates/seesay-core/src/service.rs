//! Question answering pipeline: image + question in, answer text + audio out

use image::RgbImage;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

use crate::audio::{AudioArtifact, AudioStore};
use crate::config::EngineConfig;
use crate::error::Result;
use crate::inference::{BlipVqaModel, VisionLanguageModel};
use crate::model::ModelStore;
use crate::speech::{GoogleTts, SpeechSynthesizer};

/// URL prefix under which the audio directory is served
pub const AUDIO_URL_PREFIX: &str = "/static/audio";

/// A spoken answer
#[derive(Debug, Clone)]
pub struct Answer {
    pub text: String,
    pub audio: AudioArtifact,
}

pub struct VqaService {
    model: Arc<dyn VisionLanguageModel>,
    speech: Arc<dyn SpeechSynthesizer>,
    audio: AudioStore,
}

impl VqaService {
    pub fn new(
        model: Arc<dyn VisionLanguageModel>,
        speech: Arc<dyn SpeechSynthesizer>,
        audio: AudioStore,
    ) -> Self {
        Self {
            model,
            speech,
            audio,
        }
    }

    /// Resolve model files, start the model daemon, and wire up Google TTS.
    /// Blocking; run once at startup.
    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        let files = ModelStore::new(config).resolve()?;
        info!(
            "Model {} ready in {:?}: {} tensors, {} parameters",
            files.model_id, files.dir, files.weights.tensor_count, files.weights.parameter_count
        );

        let model = BlipVqaModel::load(&files, config)?;
        let speech = GoogleTts::new(config.speech.clone());
        let audio = AudioStore::new(config.audio_dir(), AUDIO_URL_PREFIX, config.audio_retain);

        Ok(Self::new(Arc::new(model), Arc::new(speech), audio))
    }

    pub fn model_id(&self) -> &str {
        self.model.model_id()
    }

    /// Answer a question about an image and speak the answer. Blocking.
    pub fn answer(&self, image: &RgbImage, question: &str) -> Result<Answer> {
        let started = Instant::now();

        let inputs = self.model.preprocess(image, question)?;
        let token_ids = self.model.generate(&inputs)?;
        let text = self.model.decode(&token_ids)?.trim().to_string();

        let speech = self.speech.synthesize(&text)?;
        let audio = self.audio.save(&speech)?;

        info!(
            "Answered {}-char question with {}-char answer in {:.2?}, audio at {}",
            question.chars().count(),
            text.chars().count(),
            started.elapsed(),
            audio.url
        );

        Ok(Answer { text, audio })
    }

    pub fn shutdown(&self) -> Result<()> {
        self.model.shutdown()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::processor::ModelInputs;
    use image::Rgb;
    use std::sync::Mutex;

    #[derive(Default)]
    struct ScriptedModel {
        questions: Mutex<Vec<String>>,
        fail_generate: bool,
    }

    impl VisionLanguageModel for ScriptedModel {
        fn model_id(&self) -> &str {
            "scripted"
        }

        fn preprocess(&self, image: &RgbImage, question: &str) -> Result<ModelInputs> {
            self.questions.lock().unwrap().push(question.to_string());
            Ok(ModelInputs {
                pixel_values: vec![0.0; 3 * (image.width() * image.height()) as usize],
                image_height: image.height(),
                image_width: image.width(),
                input_ids: vec![1],
                attention_mask: vec![1],
            })
        }

        fn generate(&self, _inputs: &ModelInputs) -> Result<Vec<u32>> {
            if self.fail_generate {
                return Err(Error::InferenceError("model exploded".to_string()));
            }
            Ok(vec![7, 8])
        }

        fn decode(&self, token_ids: &[u32]) -> Result<String> {
            assert_eq!(token_ids, &[7, 8]);
            Ok("  two cats \n".to_string())
        }
    }

    struct EchoSpeech;

    impl SpeechSynthesizer for EchoSpeech {
        fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
            Ok(format!("MP3:{}", text).into_bytes())
        }
    }

    fn service(model: Arc<ScriptedModel>, dir: &std::path::Path) -> VqaService {
        VqaService::new(
            model,
            Arc::new(EchoSpeech),
            AudioStore::new(dir, AUDIO_URL_PREFIX, 0),
        )
    }

    fn image() -> RgbImage {
        RgbImage::from_pixel(2, 2, Rgb([1, 2, 3]))
    }

    #[test]
    fn answers_and_speaks_trimmed_text() {
        let dir = tempfile::tempdir().unwrap();
        let model = Arc::new(ScriptedModel::default());
        let svc = service(model.clone(), dir.path());

        let answer = svc.answer(&image(), "how many cats?").unwrap();

        assert_eq!(*model.questions.lock().unwrap(), vec!["how many cats?"]);
        assert_eq!(answer.text, "two cats");
        assert!(answer.audio.url.ends_with(".mp3"));
        assert_eq!(std::fs::read(&answer.audio.path).unwrap(), b"MP3:two cats");
    }

    #[test]
    fn inference_failure_leaves_no_audio() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(
            Arc::new(ScriptedModel {
                fail_generate: true,
                ..Default::default()
            }),
            dir.path(),
        );

        let err = svc.answer(&image(), "anything").unwrap_err();
        assert_eq!(err.to_string(), "Inference error: model exploded");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn repeated_questions_get_separate_audio_files() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(Arc::new(ScriptedModel::default()), dir.path());

        let a = svc.answer(&image(), "q").unwrap();
        let b = svc.answer(&image(), "q").unwrap();

        assert_eq!(a.text, b.text);
        assert_ne!(a.audio.path, b.audio.path);
        assert!(a.audio.path.exists());
    }
}
