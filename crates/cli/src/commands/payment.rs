//! Payment commands

use anyhow::{Context, Result};
use expensebook_business::{NewPayment, PaymentReconciliation};

use super::expense::print_payment;
use super::load_proof;
use crate::db::App;
use crate::PaymentAction;

/// Handle payment subcommands
pub async fn handle(app: &App, action: &PaymentAction) -> Result<()> {
    let tenant = app.tenant().await?;
    let reconciliation = PaymentReconciliation::new(&app.ctx);

    match action {
        PaymentAction::Add {
            number,
            amount,
            mode,
            proof,
            recorded_by,
        } => {
            let mut payment = NewPayment::new(*amount, mode.to_core_mode());
            if let Some(recorder) = recorded_by {
                payment = payment.recorded_by(recorder);
            }

            let receipt = match proof {
                Some(path) => {
                    let upload = load_proof(path)?;
                    reconciliation
                        .add_payment_with_proof(&tenant, number, payment, upload)
                        .await
                }
                None => reconciliation.add_payment(&tenant, number, payment).await,
            }
            .with_context(|| format!("Failed to record payment against {}", number))?;

            if app.json {
                return app.print_json(&receipt);
            }

            println!("✅ Payment recorded against {}", receipt.expense.expense_no);
            print_payment(&receipt.payment);
            println!("   Balance: {}", receipt.expense.balance_amount);
            println!("   Status:  {}", receipt.expense.status);
        }
    }

    Ok(())
}
