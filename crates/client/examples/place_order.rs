//! End-to-end walkthrough: log in, fill a cart, and place a COD order.
//!
//! Expects `CLOVEMART_API_BASE_URL` (and optionally `CLOVEMART_TOKEN_PATH`)
//! plus `CLOVEMART_DEMO_EMAIL` / `CLOVEMART_DEMO_PASSWORD` in the
//! environment or a `.env` file.

use clovemart_client::checkout::CheckoutStart;
use clovemart_client::CustomerClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "clovemart_client=debug,info".into()),
        )
        .init();

    let client = CustomerClient::from_env()?;

    let email = std::env::var("CLOVEMART_DEMO_EMAIL")?;
    let password = std::env::var("CLOVEMART_DEMO_PASSWORD")?;
    let profile = client.auth().login(&email, &password).await?;
    println!("signed in as {}", profile.name);

    let products = client.catalog().products().await?;
    let Some(product) = products.first() else {
        println!("catalog is empty, nothing to order");
        return Ok(());
    };
    let variants = client.catalog().variants(product.id).await?;
    let Some(variant) = variants.first() else {
        println!("{} has no purchasable variants", product.name);
        return Ok(());
    };

    client.cart().add_item(variant.id, 1).await?;
    println!(
        "cart: {} item(s), subtotal {}",
        client.cart().count(),
        client.cart().summary().subtotal
    );

    let mut checkout = match client.begin_checkout().await? {
        CheckoutStart::Ready(checkout) => checkout,
        CheckoutStart::NeedsLogin => anyhow::bail!("session expired"),
        CheckoutStart::EmptyCart => anyhow::bail!("cart is empty"),
    };

    let addresses = client.addresses().list().await?;
    let Some(address) = addresses.first() else {
        anyhow::bail!("no saved addresses; add one first");
    };
    checkout.select_address(address.id).await?;
    checkout.revalidate().await?;

    let quote = checkout.quote();
    println!(
        "delivery {} discount {} total {}",
        quote.delivery_charge, quote.discount, quote.final_total
    );

    let order = checkout.submit().await?;
    println!("order {} confirmed ({})", order.id, order.status);

    Ok(())
}
