//! Reconciling one month's bank statement

use bank_reconciliation::utils::MemoryStorage;
use bank_reconciliation::{
    BankAccount, BankTransaction, DocumentStatus, MatchType, NewStatement, NewStatementLine,
    Payment, Receipt, ReconciliationEngine, TransactionType,
};
use bigdecimal::BigDecimal;
use chrono::NaiveDate;

fn march(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("🏦 Bank Reconciliation - Statement Walkthrough\n");

    // Books: the account, what we invoiced and paid, and an internal entry
    let storage = MemoryStorage::new();
    storage.add_bank_account(BankAccount::new(
        "hdfc-current".to_string(),
        "HDFC Current Account".to_string(),
        "INR".to_string(),
        BigDecimal::from(61_300),
    ));
    storage.add_receipt(Receipt {
        id: "RCPT-101".to_string(),
        bank_account_id: "hdfc-current".to_string(),
        date: march(4),
        amount: BigDecimal::from(25_000),
        reference: "INV-2024-031".to_string(),
        status: DocumentStatus::Confirmed,
    });
    storage.add_receipt(Receipt {
        id: "RCPT-102".to_string(),
        bank_account_id: "hdfc-current".to_string(),
        date: march(15),
        amount: BigDecimal::from(12_000),
        reference: "INV-2024-036".to_string(),
        status: DocumentStatus::Confirmed,
    });
    storage.add_payment(Payment {
        id: "PAY-201".to_string(),
        bank_account_id: "hdfc-current".to_string(),
        date: march(8),
        amount: BigDecimal::from(8_500),
        reference: "Office rent".to_string(),
        status: DocumentStatus::Confirmed,
    });
    storage.add_transaction(BankTransaction::new(
        "BT-301".to_string(),
        "hdfc-current".to_string(),
        march(20),
        TransactionType::Debit,
        BigDecimal::from(1_200),
        "Card settlement".to_string(),
    ));
    storage.add_journal_entry("JV-0042");

    let engine = ReconciliationEngine::new(storage.clone());

    // 1. Upload the statement
    println!("📄 Uploading statement...");
    let statement = engine
        .create_statement(NewStatement {
            bank_account_id: "hdfc-current".to_string(),
            statement_number: Some("HDFC/2024/03".to_string()),
            period_from: march(1),
            period_to: march(31),
            opening_balance: BigDecimal::from(50_000),
            closing_balance: BigDecimal::from(76_800),
        })
        .await?;

    let lines = engine
        .create_statement_lines(
            &statement.id,
            vec![
                NewStatementLine::credit(march(4), BigDecimal::from(25_000))
                    .with_description("NEFT ACME TRADERS")
                    .with_reference("N064240012"),
                NewStatementLine::debit(march(8), BigDecimal::from(8_500))
                    .with_description("RENT MARCH"),
                NewStatementLine::credit(march(17), BigDecimal::from(12_000))
                    .with_description("IMPS GLOBEX"),
                NewStatementLine::debit(march(20), BigDecimal::from(1_200))
                    .with_description("CARD SETTLEMENT"),
                NewStatementLine::debit(march(28), BigDecimal::from(300))
                    .with_description("SMS CHARGES"),
                NewStatementLine::debit(march(29), BigDecimal::from(200))
                    .with_description("CHQ RETURN REVERSAL"),
            ],
        )
        .await?;
    println!("  ✓ {} lines on {}\n", lines.len(), statement.id);

    // 2. Let the engine match what it is sure about
    println!("🔍 Auto-matching...");
    let report = engine.auto_match(&statement.id).await?;
    for matched in &report.matched {
        println!(
            "  ✓ {} -> {} {} ({:.0}%)",
            matched.line_id,
            matched.match_type,
            matched.target_id,
            matched.confidence * 100.0
        );
    }
    println!("  {} lines need review\n", report.below_threshold.len());

    // 3. Review the rest by hand
    println!("🧑 Manual review...");
    let candidates = engine.find_candidates(&lines[2].id).await?;
    if let Some(best) = candidates.first() {
        println!(
            "  Suggestion for IMPS GLOBEX: {} {} ({:.0}%)",
            best.match_type,
            best.target_id,
            best.confidence * 100.0
        );
        engine
            .match_line(
                &lines[2].id,
                best.match_type,
                &best.target_id,
                "accounts@acme",
                Some("Paid two days after invoice date".to_string()),
            )
            .await?;
    }
    engine
        .mark_line_created(&lines[4].id, "JV-0042", "accounts@acme")
        .await?;
    engine
        .exclude_line(
            &lines[5].id,
            "accounts@acme",
            Some("Bank error, reversed next day".to_string()),
        )
        .await?;

    // Matching is never forced onto the wrong kind of record
    let wrong = engine
        .match_line(&lines[3].id, MatchType::Receipt, "RCPT-999", "accounts@acme", None)
        .await;
    if let Err(err) = wrong {
        println!("  ✗ Rejected: {}", err);
    }
    println!();

    // 4. Where do we stand?
    println!("📊 Reconciliation Summary");
    let summary = engine.get_summary(&statement.id).await?;
    println!("  Status:            {:?}", summary.status);
    println!(
        "  Lines:             {} matched / {} total",
        summary.matched_lines, summary.total_lines
    );
    println!("  Statement balance: ₹{}", summary.statement_balance);
    println!("  Book balance:      ₹{}", summary.book_balance);
    println!("  Difference:        ₹{}", summary.difference);

    if summary.is_balanced() {
        println!("\n✅ Statement agrees with the books");
    } else {
        println!("\n⚠️  Statement and books differ by ₹{}", summary.difference);
    }

    Ok(())
}
