use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use venta_agent::llm::{
    GenerationOptions, IntentCategory, IntentClassification, LanguageModel,
};
use venta_core::config::LlmConfig;
use venta_core::domain::message::{ChatMessage, MessageRole};
use venta_core::flows::state::{CollectedData, Sentiment};

/// OpenAI chat-completions client with per-task model routing: the mini
/// model handles classification, sentiment, and extraction; the full model
/// writes the replies the user actually reads.
pub struct OpenAiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: SecretString,
    model: String,
    mini_model: String,
}

const ANALYSIS_TEMPERATURE: f32 = 0.7;
const RESPONSE_TEMPERATURE: f32 = 0.8;

impl OpenAiClient {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("building llm http client")?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            mini_model: config.mini_model.clone(),
        })
    }

    async fn chat(
        &self,
        model: &str,
        messages: Vec<WireMessage>,
        temperature: f32,
    ) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);
        let request = ChatRequest { model, messages, temperature };

        let response = self
            .http
            .post(&url)
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .context("sending chat completion request")?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(anyhow!("chat completion failed with {status}: {detail}"));
        }

        let completion: ChatResponse =
            response.json().await.context("decoding chat completion response")?;
        completion
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| anyhow!("chat completion returned no choices"))
    }
}

#[async_trait]
impl LanguageModel for OpenAiClient {
    async fn classify_intent(
        &self,
        message: &str,
        _history: &[ChatMessage],
    ) -> Result<IntentClassification> {
        let prompt = intent_prompt(message);
        let content = self
            .chat(&self.mini_model, vec![WireMessage::user(prompt)], ANALYSIS_TEMPERATURE)
            .await?;

        match parse_intent(&content) {
            Some(classification) => Ok(classification),
            None => {
                warn!(raw = %content, "unparseable intent classification, using fallback");
                Ok(IntentClassification::fallback())
            }
        }
    }

    async fn analyze_sentiment(&self, message: &str) -> Result<Sentiment> {
        let prompt = sentiment_prompt(message);
        let content = self
            .chat(&self.mini_model, vec![WireMessage::user(prompt)], ANALYSIS_TEMPERATURE)
            .await?;
        Ok(Sentiment::from_label(&content))
    }

    async fn extract_profile(
        &self,
        message: &str,
        _history: &[ChatMessage],
    ) -> Result<CollectedData> {
        let prompt = extraction_prompt(message);
        let content = self
            .chat(&self.mini_model, vec![WireMessage::user(prompt)], ANALYSIS_TEMPERATURE)
            .await?;

        match parse_extraction(&content) {
            Some(extracted) => Ok(extracted),
            None => {
                warn!(raw = %content, "unparseable extraction output, treating as empty");
                Ok(CollectedData::default())
            }
        }
    }

    async fn generate(
        &self,
        messages: &[ChatMessage],
        system_prompt: &str,
        options: &GenerationOptions,
    ) -> Result<String> {
        let mut wire = vec![WireMessage::system(augment_system_prompt(system_prompt, options))];
        wire.extend(messages.iter().map(WireMessage::from_chat));

        debug!(model = %self.model, message_count = wire.len(), "generating reply");
        self.chat(&self.model, wire, RESPONSE_TEMPERATURE).await
    }
}

fn augment_system_prompt(system_prompt: &str, options: &GenerationOptions) -> String {
    let mut prompt = system_prompt.to_string();
    prompt.push_str(&format!(
        "\n\nIMPORTANTE: Limita tu respuesta a máximo {} palabras.",
        options.max_words
    ));
    if options.use_emojis {
        prompt.push_str(
            "\n\nIMPORTANTE: Usa emojis de manera natural en tus respuestas para hacerlas más \
             amigables y expresivas.",
        );
    } else {
        prompt.push_str("\n\nIMPORTANTE: NO uses emojis en tus respuestas.");
    }
    if let Some(context) = &options.context {
        prompt.push_str(&format!(
            "\n\nRELEVANT CONTEXT:\n{context}\n\nUse this context to inform your response when \
             relevant."
        ));
    }
    prompt
}

fn intent_prompt(message: &str) -> String {
    format!(
        "Analiza el siguiente mensaje de un cliente potencial y clasifica su intención.\n\n\
         Mensaje: \"{message}\"\n\n\
         Clasifica en una de estas categorías:\n\
         - browsing: Solo está mirando, no listo para comprar (puntuación: 0.0-0.3)\n\
         - interested: Muestra interés, hace preguntas (puntuación: 0.3-0.6)\n\
         - ready_to_buy: Señales claras de compra (puntuación: 0.6-0.9)\n\
         - objection: Tiene dudas u objeciones (puntuación: 0.4-0.6)\n\
         - leaving: Quiere terminar la conversación (puntuación: 0.0-0.2)\n\n\
         IMPORTANTE: Un saludo inicial como \"hola\", \"buenos días\", \"hey\" debe clasificarse \
         como \"interested\" con puntuación entre 0.4-0.5, ya que el cliente está iniciando una \
         conversación.\n\n\
         Responde SOLO con JSON válido en este formato exacto:\n\
         {{\"category\": \"nombre_categoria\", \"score\": 0.0}}"
    )
}

fn sentiment_prompt(message: &str) -> String {
    format!(
        "Analiza el sentimiento de este mensaje del cliente.\n\n\
         Mensaje: \"{message}\"\n\n\
         Responde con UNA SOLA PALABRA: positive, neutral, o negative"
    )
}

fn extraction_prompt(message: &str) -> String {
    format!(
        "Extrae cualquier información del cliente de este mensaje.\n\n\
         Mensaje: \"{message}\"\n\n\
         Busca:\n\
         - name: Nombre del cliente\n\
         - email: Dirección de correo electrónico\n\
         - phone: Número de teléfono\n\
         - needs: Lo que está buscando\n\
         - budget: Presupuesto o rango de precios mencionado\n\
         - pain_points: Problemas que quiere resolver\n\n\
         Responde SOLO con JSON válido. Si un campo no está presente, usa null.\n\
         {{\"name\": null, \"email\": null, \"phone\": null, \"needs\": null, \
         \"budget\": null, \"pain_points\": null}}"
    )
}

/// Pulls the first JSON object out of a model reply, tolerating code fences
/// and prose around it.
fn extract_json(content: &str) -> Option<&str> {
    let start = content.find('{')?;
    let end = content.rfind('}')?;
    (end > start).then(|| &content[start..=end])
}

fn parse_intent(content: &str) -> Option<IntentClassification> {
    #[derive(Deserialize)]
    struct WireIntent {
        category: String,
        score: f64,
    }

    let wire: WireIntent = serde_json::from_str(extract_json(content)?).ok()?;
    let category = IntentCategory::parse(&wire.category).unwrap_or(IntentCategory::Browsing);
    if !(0.0..=1.0).contains(&wire.score) {
        return None;
    }
    Some(IntentClassification { category, score: wire.score })
}

fn parse_extraction(content: &str) -> Option<CollectedData> {
    let mut extracted: CollectedData =
        serde_json::from_str(extract_json(content)?).ok()?;

    // Blank strings count as absent.
    for field in [
        &mut extracted.name,
        &mut extracted.email,
        &mut extracted.phone,
        &mut extracted.needs,
        &mut extracted.budget,
        &mut extracted.pain_points,
    ] {
        if field.as_deref().map(str::trim).map_or(false, str::is_empty) {
            *field = None;
        }
    }

    Some(extracted)
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage>,
    temperature: f32,
}

#[derive(Serialize)]
struct WireMessage {
    role: &'static str,
    content: String,
}

impl WireMessage {
    fn system(content: String) -> Self {
        Self { role: "system", content }
    }

    fn user(content: String) -> Self {
        Self { role: "user", content }
    }

    fn from_chat(message: &ChatMessage) -> Self {
        let role = match message.role {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        };
        Self { role, content: message.content.clone() }
    }
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: String,
}
