use std::path::Path;

use anyhow::Result;

/// `courier models`: list the models the configured key can use for chat.
pub async fn list_models(config_path: Option<&Path>) -> Result<()> {
    let config = crate::load_config(config_path)?;
    let provider = crate::gemini_provider(&config.gemini)?;

    let mut models = provider.list_models().await?;
    models.retain(|m| m.supports_generation());
    models.sort_by(|a, b| a.model_id().cmp(b.model_id()));

    if models.is_empty() {
        println!("No models support generateContent for this API key.");
        return Ok(());
    }

    for model in &models {
        let marker = if model.model_id() == provider.model() {
            " (chat)"
        } else if model.model_id() == provider.vision_model() {
            " (vision)"
        } else {
            ""
        };
        println!(
            "  {}{marker}  {}  [in {} / out {} tokens]",
            model.model_id(),
            model.display_name,
            model.input_token_limit,
            model.output_token_limit
        );
    }

    Ok(())
}
