//! Expense commands

use anyhow::{Context, Result};
use expensebook_business::{ExpenseLedger, NewExpense};
use expensebook_core::{Expense, Payment};

use super::load_proof;
use crate::db::App;
use crate::ExpenseAction;

/// Handle expense subcommands
pub async fn handle(app: &App, action: &ExpenseAction) -> Result<()> {
    let tenant = app.tenant().await?;
    let ledger = ExpenseLedger::new(&app.ctx);

    match action {
        ExpenseAction::Create {
            total,
            paid,
            invoice,
            payment_proof,
            mode,
            recorded_by,
            site,
            category,
            vendor,
            date,
            description,
        } => {
            let draft = NewExpense {
                total: *total,
                paid_now: *paid,
                site_id: site.clone(),
                category_id: category.clone(),
                vendor_id: vendor.clone(),
                payment_mode: Some(mode.to_core_mode()),
                recorded_by: recorded_by.clone(),
                expense_date: *date,
                description: description.clone(),
                ..Default::default()
            };
            let invoice = load_proof(invoice)?;
            let payment_proof = payment_proof.as_deref().map(load_proof).transpose()?;

            let receipt = ledger
                .create_expense_with_proofs(&tenant, draft, invoice, payment_proof)
                .await
                .context("Failed to record expense")?;

            if app.json {
                return app.print_json(&receipt);
            }

            println!("✅ Expense recorded: {}", receipt.document_number());
            print_expense(&receipt.expense);
        }

        ExpenseAction::Show { number } => {
            let expense = ledger.get_expense(&tenant, number).await?;
            if app.json {
                return app.print_json(&expense);
            }
            println!("📋 Expense {}", expense.expense_no);
            print_expense(&expense);
        }

        ExpenseAction::List { limit } => {
            let expenses = ledger.list_expenses(&tenant, *limit).await?;
            if app.json {
                return app.print_json(&expenses);
            }
            if expenses.is_empty() {
                println!("No expenses found.");
                return Ok(());
            }

            println!(
                "{:<10} {:>12} {:>12} {:>12} {:<8} {:<15}",
                "NUMBER", "TOTAL", "PAID", "BALANCE", "STATUS", "CREDIT"
            );
            println!("{}", "-".repeat(74));
            for e in expenses {
                println!(
                    "{:<10} {:>12} {:>12} {:>12} {:<8} {:<15}",
                    e.expense_no.as_str(),
                    e.total_amount.to_string(),
                    e.paid_amount.to_string(),
                    e.balance_amount.to_string(),
                    e.status.as_str(),
                    e.credit_status.as_str()
                );
            }
        }

        ExpenseAction::History { number } => {
            let payments = ledger.payment_history(&tenant, number).await?;
            if app.json {
                return app.print_json(&payments);
            }
            if payments.is_empty() {
                println!("No payments recorded for {}.", number);
                return Ok(());
            }
            println!("💳 Payments for {}", number);
            for payment in &payments {
                print_payment(payment);
            }
        }
    }

    Ok(())
}

fn print_expense(e: &Expense) {
    println!("   Total:    {}", e.total_amount);
    println!("   Paid:     {}", e.paid_amount);
    println!("   Balance:  {}", e.balance_amount);
    println!("   Status:   {}", e.status);
    println!("   Credit:   {}", e.credit_status);
    if let Some(date) = e.expense_date {
        println!("   Date:     {}", date);
    }
    if let Some(description) = &e.description {
        println!("   Note:     {}", description);
    }
    println!("   Invoice:  {}", e.bill_image_url);
    if let Some(proof) = &e.first_payment_proof {
        println!("   Proof:    {}", proof);
    }
}

pub(crate) fn print_payment(p: &Payment) {
    let recorder = p
        .recorded_by
        .as_ref()
        .map(|r| r.to_string())
        .unwrap_or_else(|| "-".to_string());
    println!("   - {} by {}", p, recorder);
    if let Some(url) = &p.proof_url {
        println!("     proof: {}", url);
    }
}
