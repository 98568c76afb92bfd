//! Integration commands.

use dialoguer::Confirm;
use podforge_client::{
    ConnectionState, Gateway, IntegrationsController, MessageKind, PodClient, ProviderView,
};
use podforge_core::Provider;

use super::CommandError;

fn print_view(view: &ProviderView) {
    println!("{:<8} {}", view.provider.display_name(), view.state);
    if let Some(shop) = view.item.shop_domain() {
        println!("         shop: {shop}");
    }
    if let Some(verified) = view.item.last_verified() {
        println!("         last verified: {verified}");
    }
    if let Some(err) = &view.refresh_error {
        println!("         refresh failed: {err}");
    }
}

fn print_message<G: Gateway>(page: &IntegrationsController<G>) {
    if let Some(message) = page.message() {
        match message.kind {
            MessageKind::Info => println!("{}", message.text),
            MessageKind::Error => println!("Error: {}", message.text),
        }
    }
}

async fn load<G: Gateway>(client: PodClient<G>) -> IntegrationsController<G> {
    let page = IntegrationsController::new(client);
    page.wait_until_loaded().await;
    page
}

/// Print the connection state of every provider.
pub async fn status<G: Gateway>(client: PodClient<G>) -> Result<(), CommandError> {
    let page = load(client).await;
    for view in page.views() {
        print_view(&view);
    }
    Ok(())
}

/// Store a Gelato API key.
pub async fn connect_gelato<G: Gateway>(client: PodClient<G>, api_key: &str) -> Result<(), CommandError> {
    let page = load(client).await;
    let result = page.connect_gelato(api_key).await;
    print_message(&page);
    result?;

    print_view(&page.view(Provider::Gelato));
    Ok(())
}

/// Start Shopify OAuth and print where to authorize.
pub async fn connect_shopify<G: Gateway>(client: PodClient<G>, shop: &str) -> Result<(), CommandError> {
    let page = load(client).await;
    let url = page.start_shopify(shop).await.inspect_err(|_| print_message(&page))?;

    println!("Open this URL to authorize the app:");
    println!("  {url}");
    println!("Then run `pod-cli shopify return`.");
    Ok(())
}

/// Re-read the Shopify connection after authorization.
pub async fn shopify_return<G: Gateway>(client: PodClient<G>) -> Result<(), CommandError> {
    let page = load(client).await;
    let view = page.complete_shopify_return().await;
    print_message(&page);
    print_view(&view);
    Ok(())
}

/// Ask the server to verify the Shopify credential.
pub async fn test_shopify<G: Gateway>(client: PodClient<G>) -> Result<(), CommandError> {
    let page = load(client).await;
    let result = page.test_shopify().await;
    print_message(&page);
    result?;
    Ok(())
}

/// Disconnect a provider after confirmation.
pub async fn disconnect<G: Gateway>(
    client: PodClient<G>,
    provider: Provider,
    yes: bool,
) -> Result<(), CommandError> {
    let page = load(client).await;
    page.request_disconnect(provider)
        .inspect_err(|_| print_message(&page))?;

    let confirmed = yes
        || Confirm::new()
            .with_prompt(format!("Disconnect {}?", provider.display_name()))
            .default(false)
            .interact()?;
    if !confirmed {
        page.cancel_disconnect();
        println!("Cancelled.");
        return Ok(());
    }

    let result = page.confirm_disconnect().await;
    print_message(&page);
    result?;

    // Show the provider only if the server still reports it.
    let view = page.view(provider);
    if !matches!(view.state, ConnectionState::Disconnected) {
        print_view(&view);
    }
    Ok(())
}
