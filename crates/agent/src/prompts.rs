use venta_core::domain::message::{ChatMessage, MessageRole};
use venta_core::domain::profile::BotProfile;

/// Persona fallback when a tenant has not configured a system prompt yet.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a friendly sales assistant.";

/// Greeting fallback for the first user turn.
pub const DEFAULT_WELCOME_MESSAGE: &str =
    "¡Hola! 👋 Soy tu asistente virtual. ¿En qué puedo ayudarte hoy?";

pub const SUMMARY_SYSTEM_PROMPT: &str =
    "Eres un asistente que genera resúmenes concisos de conversaciones de ventas.";

/// Phrases that mean the user wants a human. Matched case-insensitively
/// against the raw message text.
pub const HUMAN_REQUEST_KEYWORDS: &[&str] = &[
    "humano",
    "persona",
    "supervisor",
    "agente",
    "operador",
    "hablar con alguien",
    "hablar con un",
    "hablar con una",
    "asistente real",
    "persona real",
];

pub fn requests_human(message: &str) -> bool {
    let lowered = message.to_lowercase();
    HUMAN_REQUEST_KEYWORDS.iter().any(|keyword| lowered.contains(keyword))
}

/// Builds the system prompt for the conversation branch: the tenant's base
/// instructions plus a product/service section when one is configured.
pub fn build_system_prompt(profile: &BotProfile) -> String {
    let base = if profile.system_prompt.trim().is_empty() {
        DEFAULT_SYSTEM_PROMPT
    } else {
        profile.system_prompt.as_str()
    };

    if !profile.has_product_info() {
        return base.to_string();
    }

    let mut prompt = format!("{base}\n\n");
    prompt.push_str("=== INFORMACIÓN DEL PRODUCTO/SERVICIO ===\n");

    let name = profile.product_name.trim();
    if !name.is_empty() {
        prompt.push_str(&format!("Producto/Servicio: {name}\n"));
    }
    let description = profile.product_description.trim();
    if !description.is_empty() {
        prompt.push_str(&format!("\nDescripción:\n{description}\n"));
    }
    let features = profile.product_features.trim();
    if !features.is_empty() {
        prompt.push_str(&format!("\nCaracterísticas principales:\n{features}\n"));
    }
    let benefits = profile.product_benefits.trim();
    if !benefits.is_empty() {
        prompt.push_str(&format!("\nBeneficios para el cliente:\n{benefits}\n"));
    }
    let price = profile.product_price.trim();
    if !price.is_empty() {
        prompt.push_str(&format!("\nPrecio: {price}\n"));
    }
    let target = profile.product_target_audience.trim();
    if !target.is_empty() {
        prompt.push_str(&format!("\nPúblico objetivo: {target}\n"));
    }

    prompt.push_str("\n=== INSTRUCCIONES ===\n");
    prompt.push_str(
        "Usa esta información para responder preguntas sobre el producto/servicio de manera \
         natural y conversacional. NO menciones que tienes esta información directamente, \
         simplemente úsala para dar respuestas precisas y útiles.",
    );

    prompt
}

/// Renders the history as a `Cliente:`/`Bot:` transcript for summarization.
pub fn transcript(messages: &[ChatMessage]) -> String {
    messages
        .iter()
        .map(|message| match message.role {
            MessageRole::User => format!("Cliente: {}", message.content),
            MessageRole::Assistant => format!("Bot: {}", message.content),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn summary_prompt(messages: &[ChatMessage]) -> String {
    format!(
        "Genera un resumen conciso de esta conversación de ventas.\n\n\
         Conversación:\n{}\n\n\
         El resumen debe incluir:\n\
         1. Tema principal de la conversación\n\
         2. Necesidades o intereses del cliente\n\
         3. Productos o servicios discutidos\n\
         4. Objeciones o preocupaciones mencionadas\n\
         5. Próximos pasos o estado actual\n\n\
         Genera SOLO el resumen en formato de párrafo conciso (máximo 150 palabras).",
        transcript(messages)
    )
}

pub fn payment_prompt(customer_name: &str, payment_link: &str) -> String {
    let name = if customer_name.trim().is_empty() { "cliente" } else { customer_name };
    format!(
        "Genera un mensaje de cierre cálido y profesional para un cliente que está listo \
         para comprar.\n\n\
         Nombre del cliente: {name}\n\
         Link de pago: {payment_link}\n\n\
         El mensaje debe:\n\
         1. Agradecerles por su interés\n\
         2. Confirmar que están listos para proceder\n\
         3. Incluir el link de pago de forma natural\n\
         4. Animarlos a contactar si tienen preguntas\n\
         5. Ser conciso (máximo 2-3 oraciones)\n\n\
         Genera SOLO el texto del mensaje, sin comentarios adicionales."
    )
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use venta_core::domain::message::ChatMessage;
    use venta_core::domain::profile::BotProfile;

    use super::{build_system_prompt, requests_human, transcript, DEFAULT_SYSTEM_PROMPT};

    #[test]
    fn bare_profile_yields_base_prompt_only() {
        let prompt = build_system_prompt(&BotProfile::default());
        assert_eq!(prompt, DEFAULT_SYSTEM_PROMPT);
    }

    #[test]
    fn product_fields_are_folded_into_the_prompt() {
        let profile = BotProfile {
            system_prompt: "Eres Valentina, asesora de ventas.".into(),
            product_name: "Curso de Inglés Online".into(),
            product_price: "99 USD".into(),
            ..BotProfile::default()
        };

        let prompt = build_system_prompt(&profile);
        assert!(prompt.starts_with("Eres Valentina, asesora de ventas."));
        assert!(prompt.contains("Producto/Servicio: Curso de Inglés Online"));
        assert!(prompt.contains("Precio: 99 USD"));
        assert!(!prompt.contains("Descripción"));
        assert!(prompt.contains("=== INSTRUCCIONES ==="));
    }

    #[test]
    fn human_request_detection_is_case_insensitive() {
        assert!(requests_human("Quiero hablar con un HUMANO"));
        assert!(requests_human("puedo hablar con alguien?"));
        assert!(!requests_human("quiero más información del curso"));
    }

    #[test]
    fn transcript_tags_roles_in_spanish() {
        let now = Utc::now();
        let text = transcript(&[
            ChatMessage::user("hola", now),
            ChatMessage::assistant("buenas tardes", now),
        ]);
        assert_eq!(text, "Cliente: hola\nBot: buenas tardes");
    }
}
