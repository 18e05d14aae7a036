use reqwest::Client;
use serde_json::{json, Value};

const SERVER_URL: &str = "http://localhost:8000";

// Drives one patient's day against a running medpost server: read the
// doctor's note, reply to it, ask for a prescription re-issue, and try a
// spoofed reply that must bounce.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let client = Client::new();

    println!("--- 🏥 medpost: one patient's day ---");

    // The seeded conversation starter is waiting in the patient's inbox.
    let index: Value = client
        .get(format!("{}/", SERVER_URL))
        .send()
        .await?
        .json()
        .await?;
    let starter_id = index["patient_inbox"]
        .as_array()
        .and_then(|mail| mail.first())
        .and_then(|m| m["id"].as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| anyhow::anyhow!("no seeded message in the patient inbox"))?;
    println!("📬 doctor's note waiting: {}", starter_id);

    // Open it (this is what marks it read).
    let shown: Value = client
        .get(format!("{}/messages/{}", SERVER_URL, starter_id))
        .send()
        .await?
        .json()
        .await?;
    println!(
        "📖 read: {}",
        shown["message"]["body"].as_str().unwrap_or("(empty)")
    );

    // Reply within the week — this lands with the doctor.
    let reply = client
        .post(format!("{}/messages", SERVER_URL))
        .json(&json!({ "body": "Thanks, doctor!", "original_message_id": starter_id }))
        .send()
        .await?;
    println!("✉️  reply sent: {}", reply.status());

    // Ask for a prescription re-issue against the same conversation.
    let prescription = client
        .post(format!(
            "{}/messages/{}/prescription",
            SERVER_URL, starter_id
        ))
        .send()
        .await?;
    let status = prescription.status();
    let body: Value = prescription.json().await?;
    println!(
        "💊 prescription request: {} — {}",
        status,
        body["notice"].as_str().unwrap_or("(no notice)")
    );

    // A forged reply reference must bounce with 404, not create mail.
    let spoof = client
        .post(format!("{}/messages", SERVER_URL))
        .json(&json!({ "body": "let me in", "original_message_id": "forged-reference" }))
        .send()
        .await?;
    println!("🚫 spoofed reply rejected: {}", spoof.status());

    println!("--- 🏁 done ---");
    Ok(())
}
