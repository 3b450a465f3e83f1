use actix_web_csp_policies::{
    CspConfig, CspLevel, CspPolicyBuilder, DeliveryMethod, HeaderComposer, InMemoryPolicyStore,
    PolicyStore, RenderOptions, SelectionCriteria,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = CspConfig::new();
    let store = InMemoryPolicyStore::new();

    store.insert(
        CspPolicyBuilder::new()
            .title("Site default")
            .base_policy(true)
            .live(true)
            .default_src("'self'")
            .object_src("'none'")
            .frame_ancestors("'none'")
            .send_violation_reports(true)
            .minimum_csp_level(CspLevel::Level2)
            .build()?,
    )?;

    let page = store.insert(
        CspPolicyBuilder::new()
            .title("Checkout")
            .live(true)
            .script_src("'self' https://payments.example")
            .build()?,
    )?;

    let composer = HeaderComposer::from_config(&config);
    let criteria = SelectionCriteria::new(true, DeliveryMethod::Header).with_page_policy(Some(page));

    match store.select(&criteria) {
        Some(selection) => {
            if let Some(composed) = composer.compose_selection(&selection, &RenderOptions::header()) {
                println!("{}: {}", composed.header, composed.policy_string);
                println!("{}", serde_json::to_string_pretty(&composed.reporting)?);
            }
            if let Some(preview) =
                composer.compose(&selection.policy, selection.merge_from.as_deref(), &RenderOptions::preview())
            {
                println!("\nPreview:\n{}", preview.policy_string);
            }
        }
        None => println!("No policy applies"),
    }

    Ok(())
}
