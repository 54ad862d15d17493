mod common;

use anyhow::Result;
use uuid::Uuid;

use crediflow::authz::roles;
use crediflow::errors::AppError;
use crediflow::workflow::{self, ReviewEntity, ReviewStatus};

#[tokio::test]
async fn full_path_from_submission_to_collections_handoff() -> Result<()> {
    let (_dir, pool) = common::setup_pool().await?;

    let trader = common::insert_principal(&pool, "trader", "t@example.com").await?;
    let lead = common::staff_with_role(&pool, "lead@example.com", roles::CREDIT_OPS_LEAD).await?;
    let head = common::staff_with_role(&pool, "head@example.com", roles::HEAD_OF_CREDIT).await?;
    let collector = common::staff_with_role(&pool, "col@example.com", roles::COLLECTIONS).await?;

    let vendor = common::insert_vendor(&pool, "Acme Metals").await?;
    let invoice = common::insert_invoice(&pool, trader, vendor, "INV-100", 1500.0, "PENDING").await?;
    let m1 = common::insert_milestone(&pool, invoice, trader, 500.0, "PENDING").await?;
    let m2 = common::insert_milestone(&pool, invoice, trader, 1000.0, "PENDING").await?;

    // Approve both milestones, then the invoice itself.
    workflow::transition_review(&pool, ReviewEntity::Milestone, m1, ReviewStatus::Approved, lead).await?;
    workflow::transition_review(&pool, ReviewEntity::Milestone, m2, ReviewStatus::Approved, lead).await?;
    workflow::transition_review(&pool, ReviewEntity::Invoice, invoice, ReviewStatus::Approved, lead).await?;

    let handoff = workflow::complete_invoice(&pool, invoice, head).await?;
    assert_eq!(common::invoice_status(&pool, invoice).await?, "FULLY_DELIVERED");

    // Completion records who closed it out and when.
    let (reviewed_by, review_date): (Uuid, Option<chrono::DateTime<chrono::Utc>>) =
        sqlx::query_as("SELECT reviewed_by, review_date FROM invoices WHERE id = ?")
            .bind(invoice)
            .fetch_one(&pool)
            .await?;
    assert_eq!(reviewed_by, head);
    assert!(review_date.is_some());

    assert_eq!(handoff.invoice_number, "INV-100");
    assert_eq!(handoff.vendor_name, "Acme Metals");
    assert_eq!(handoff.milestone_amounts, vec![500.0, 1000.0]);
    assert_eq!(handoff.recipients, vec![collector]);

    workflow::notify_collections(&pool, &handoff).await;

    // One notification row, fanned out to the collections staff, with a
    // deep link back to the invoice.
    let (message, link, user_id): (String, String, Uuid) = sqlx::query_as(
        "SELECT message, link, user_id FROM notifications WHERE kind = 'collections_handoff'",
    )
    .fetch_one(&pool)
    .await?;
    assert!(message.contains("INV-100"));
    assert_eq!(link, format!("/admin/invoices/{invoice}"));
    assert_eq!(user_id, trader);

    let recipient: Uuid = sqlx::query_scalar(
        "SELECT r.admin_id FROM notification_recipients r
         JOIN notifications n ON n.id = r.notification_id
         WHERE n.kind = 'collections_handoff'",
    )
    .fetch_one(&pool)
    .await?;
    assert_eq!(recipient, collector);

    let emails: Vec<(Uuid, String)> =
        sqlx::query_as("SELECT recipient_id, subject FROM email_outbox")
            .fetch_all(&pool)
            .await?;
    assert_eq!(emails.len(), 1);
    assert_eq!(emails[0].0, collector);
    assert!(emails[0].1.contains("INV-100"));

    Ok(())
}

#[tokio::test]
async fn completion_is_blocked_while_a_milestone_is_unapproved() -> Result<()> {
    let (_dir, pool) = common::setup_pool().await?;

    let trader = common::insert_principal(&pool, "trader", "t@example.com").await?;
    let head = common::staff_with_role(&pool, "head@example.com", roles::HEAD_OF_CREDIT).await?;
    let vendor = common::insert_vendor(&pool, "Acme").await?;
    let invoice = common::insert_invoice(&pool, trader, vendor, "INV-1", 900.0, "APPROVED").await?;
    common::insert_milestone(&pool, invoice, trader, 400.0, "APPROVED").await?;
    common::insert_milestone(&pool, invoice, trader, 500.0, "PENDING").await?;

    let err = workflow::complete_invoice(&pool, invoice, head).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidTransition(_)));

    // Nothing moved.
    assert_eq!(common::invoice_status(&pool, invoice).await?, "APPROVED");

    Ok(())
}

#[tokio::test]
async fn completion_requires_an_approved_invoice() -> Result<()> {
    let (_dir, pool) = common::setup_pool().await?;

    let trader = common::insert_principal(&pool, "trader", "t@example.com").await?;
    let head = common::staff_with_role(&pool, "head@example.com", roles::HEAD_OF_CREDIT).await?;
    let vendor = common::insert_vendor(&pool, "Acme").await?;
    let invoice = common::insert_invoice(&pool, trader, vendor, "INV-2", 100.0, "PENDING").await?;

    let err = workflow::complete_invoice(&pool, invoice, head).await.unwrap_err();
    match err {
        AppError::InvalidTransition(message) => assert!(message.contains("PENDING")),
        other => panic!("expected InvalidTransition, got {other:?}"),
    }

    Ok(())
}

#[tokio::test]
async fn review_rejects_targets_outside_the_review_pair() -> Result<()> {
    let (_dir, pool) = common::setup_pool().await?;

    let trader = common::insert_principal(&pool, "trader", "t@example.com").await?;
    let lead = common::staff_with_role(&pool, "lead@example.com", roles::CREDIT_OPS_LEAD).await?;
    let vendor = common::insert_vendor(&pool, "Acme").await?;
    let invoice = common::insert_invoice(&pool, trader, vendor, "INV-3", 100.0, "PENDING").await?;

    // FULLY_DELIVERED is reachable only through completion, never review.
    let err = workflow::transition_review(
        &pool,
        ReviewEntity::Invoice,
        invoice,
        ReviewStatus::FullyDelivered,
        lead,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::InvalidTransition(_)));

    // PENDING -> PENDING is no transition at all.
    let err = workflow::transition_review(&pool, ReviewEntity::Invoice, invoice, ReviewStatus::Pending, lead)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidTransition(_)));

    Ok(())
}

#[tokio::test]
async fn reviewing_an_already_reviewed_entity_names_the_current_state() -> Result<()> {
    let (_dir, pool) = common::setup_pool().await?;

    let trader = common::insert_principal(&pool, "trader", "t@example.com").await?;
    let lead = common::staff_with_role(&pool, "lead@example.com", roles::CREDIT_OPS_LEAD).await?;
    let vendor = common::insert_vendor(&pool, "Acme").await?;
    let invoice = common::insert_invoice(&pool, trader, vendor, "INV-4", 100.0, "REJECTED").await?;

    let err = workflow::transition_review(&pool, ReviewEntity::Invoice, invoice, ReviewStatus::Approved, lead)
        .await
        .unwrap_err();
    match err {
        AppError::InvalidTransition(message) => {
            assert!(message.contains("REJECTED"), "got: {message}");
        }
        other => panic!("expected InvalidTransition, got {other:?}"),
    }

    Ok(())
}

#[tokio::test]
async fn soft_deleted_entities_read_as_not_found() -> Result<()> {
    let (_dir, pool) = common::setup_pool().await?;

    let trader = common::insert_principal(&pool, "trader", "t@example.com").await?;
    let lead = common::staff_with_role(&pool, "lead@example.com", roles::CREDIT_OPS_LEAD).await?;
    let vendor = common::insert_vendor(&pool, "Acme").await?;
    let invoice = common::insert_invoice(&pool, trader, vendor, "INV-5", 100.0, "PENDING").await?;

    sqlx::query("UPDATE invoices SET deleted_at = ? WHERE id = ?")
        .bind(chrono::Utc::now())
        .bind(invoice)
        .execute(&pool)
        .await?;

    let err = workflow::transition_review(&pool, ReviewEntity::Invoice, invoice, ReviewStatus::Approved, lead)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    Ok(())
}
