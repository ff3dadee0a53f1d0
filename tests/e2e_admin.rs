//! End-to-end tests for the administrative surface: invariants enforced on
//! write, option deletion guard, cascading deletes.

mod common;

use common::fixture;
use contacts_eav::{
    Directory, Error, NewOption, NewProperty, OptionPatch, PropertyPatch, PropertyType,
    PropertyValue, QueryParams, StorageBackend,
};

// ============================================================================
// 1. Properties
// ============================================================================

#[tokio::test]
async fn test_slug_is_derived_from_name() {
    let dir = Directory::open_memory();
    let p = dir
        .create_property(NewProperty::new("  Job Title (Current) ", PropertyType::Singleline), None)
        .await
        .unwrap();
    assert_eq!(p.slug, "job_title__current_");
    assert_eq!(p.name, "Job Title (Current)");
}

#[tokio::test]
async fn test_slug_type_pair_is_unique() {
    let dir = Directory::open_memory();
    dir.create_property(NewProperty::new("Email", PropertyType::Singleline), None)
        .await
        .unwrap();

    let err = dir
        .create_property(NewProperty::new("Email", PropertyType::Singleline), None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ConstraintViolation(_)));

    // same slug, different type is allowed
    dir.create_property(NewProperty::new("Email", PropertyType::Textarea), None)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_empty_name_rejected() {
    let dir = Directory::open_memory();
    let err = dir
        .create_property(NewProperty::new("   ", PropertyType::Singleline), None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ValidationError(_)));
}

#[tokio::test]
async fn test_update_property_records_actor() {
    let fx = fixture().await;
    let notes = fx.dir.backend().get_property_by_slug("notes").await.unwrap();
    let editor = contacts_eav::UserId::new();

    let updated = fx
        .dir
        .update_property(
            notes.id,
            PropertyPatch { name: Some("Remarks".into()), slug: None },
            Some(editor),
        )
        .await
        .unwrap();
    assert_eq!(updated.name, "Remarks");
    assert_eq!(updated.slug, "notes");
    assert_eq!(updated.audit.created_by, Some(fx.user));
    assert_eq!(updated.audit.changed_by, Some(editor));
}

// ============================================================================
// 2. Options
// ============================================================================

#[tokio::test]
async fn test_option_code_unique_per_property() {
    let fx = fixture().await;
    let err = fx
        .dir
        .add_option(fx.it.property, NewOption::new("Information Tech").with_code("it"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ConstraintViolation(_)));

    // the same code on another property is fine
    fx.dir
        .add_option(fx.active.property, NewOption::new("IT").with_code("it"))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_options_listed_by_order_then_value() {
    let dir = Directory::open_memory();
    let p = dir
        .create_property(NewProperty::new("Tier", PropertyType::Option), None)
        .await
        .unwrap();
    dir.add_option(p.id, NewOption::new("Gold").with_order(1)).await.unwrap();
    dir.add_option(p.id, NewOption::new("Silver").with_order(0)).await.unwrap();
    dir.add_option(p.id, NewOption::new("Bronze").with_order(1)).await.unwrap();

    let labels: Vec<_> = dir
        .list_options(p.id)
        .await
        .unwrap()
        .into_iter()
        .map(|o| o.value)
        .collect();
    assert_eq!(labels, vec!["Silver", "Bronze", "Gold"]);
}

#[tokio::test]
async fn test_referenced_option_cannot_be_deleted() {
    let fx = fixture().await;
    assert_eq!(fx.dir.option_usage(fx.it.id).await.unwrap(), 2);

    let err = fx.dir.delete_option(fx.it.id).await.unwrap_err();
    match &err {
        Error::OptionInUse { value, usages } => {
            assert_eq!(value, "IT Department");
            assert_eq!(*usages, 2);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(
        err.to_string(),
        "Cannot delete option \"IT Department\" because it is used by 2 contacts"
    );

    // nothing changed
    assert!(fx.dir.option(fx.it.id).await.is_ok());
    let listing = fx.dir.list(&QueryParams::parse("department=it")).await.unwrap();
    assert_eq!(listing.page_info.count, 2);
}

#[tokio::test]
async fn test_unreferenced_option_deleted() {
    let fx = fixture().await;
    let legal = fx
        .dir
        .add_option(fx.it.property, NewOption::new("Legal"))
        .await
        .unwrap();
    assert!(fx.dir.delete_option(legal.id).await.unwrap());
    assert!(!fx.dir.delete_option(legal.id).await.unwrap());
}

#[tokio::test]
async fn test_option_rename_shows_in_listing() {
    let fx = fixture().await;
    fx.dir
        .update_option(
            fx.hr.id,
            OptionPatch { value: Some("People Ops".into()), ..Default::default() },
        )
        .await
        .unwrap();

    let listing = fx.dir.list(&QueryParams::parse("department=people")).await.unwrap();
    assert_eq!(listing.page_info.count, 1);
    assert_eq!(listing.items[0]["department"]["value"], "People Ops");
    assert_eq!(listing.items[0]["department"]["code"], "hr");
}

// ============================================================================
// 3. Values
// ============================================================================

#[tokio::test]
async fn test_set_value_replaces_previous() {
    let fx = fixture().await;
    let first = fx.dir.backend().get_property_by_slug("first_name").await.unwrap();

    let before = fx.dir.backend().value_count().await.unwrap();
    fx.dir
        .set_value(fx.john.id, first.id, PropertyValue::Text("Johnny".into()), None)
        .await
        .unwrap();
    assert_eq!(fx.dir.backend().value_count().await.unwrap(), before);

    let listing = fx.dir.list(&QueryParams::parse("first_name=johnny")).await.unwrap();
    assert_eq!(listing.page_info.count, 1);
}

#[tokio::test]
async fn test_type_mismatch_rejected() {
    let fx = fixture().await;
    let status = fx.dir.backend().get_property_by_slug("status").await.unwrap();
    let err = fx
        .dir
        .set_value(fx.bob.id, status.id, PropertyValue::Text("active".into()), None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::TypeError { .. }));
}

#[tokio::test]
async fn test_foreign_option_rejected() {
    let fx = fixture().await;
    let err = fx
        .dir
        .set_value(fx.bob.id, fx.it.property, PropertyValue::OptionRef(fx.active.id), None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ValidationError(_)));
}

#[tokio::test]
async fn test_set_by_slug_accepts_code_or_label() {
    let fx = fixture().await;
    fx.dir
        .set_value_by_slug(fx.bob.id, "department", "HR Department", None)
        .await
        .unwrap();
    let record = fx.dir.contact(fx.bob.id).await.unwrap();
    let dept = record.value_for(fx.hr.property).unwrap();
    assert_eq!(dept.value, PropertyValue::OptionRef(fx.hr.id));

    let err = fx
        .dir
        .set_value_by_slug(fx.bob.id, "department", "Finance", None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn test_remove_value() {
    let fx = fixture().await;
    let notes = fx.dir.backend().get_property_by_slug("notes").await.unwrap();
    assert!(fx.dir.remove_value(fx.john.id, notes.id, None).await.unwrap());
    assert!(!fx.dir.remove_value(fx.john.id, notes.id, None).await.unwrap());

    let listing = fx.dir.list(&QueryParams::parse("notes=developer")).await.unwrap();
    assert_eq!(listing.page_info.count, 0);
}

// ============================================================================
// 4. Cascading deletes
// ============================================================================

#[tokio::test]
async fn test_delete_contact_cascades() {
    let fx = fixture().await;
    let before = fx.dir.backend().value_count().await.unwrap();

    assert!(fx.dir.delete_contact(fx.john.id).await.unwrap());
    assert_eq!(fx.dir.backend().value_count().await.unwrap(), before - 6);
    assert_eq!(fx.dir.backend().contact_count().await.unwrap(), 2);
    assert!(matches!(fx.dir.detail(fx.john.id).await, Err(Error::NotFound(_))));

    // the option is free once its only other users are gone
    fx.dir.delete_contact(fx.bob.id).await.unwrap();
    assert_eq!(fx.dir.option_usage(fx.it.id).await.unwrap(), 0);
    assert!(fx.dir.delete_option(fx.it.id).await.unwrap());
}

#[tokio::test]
async fn test_delete_property_cascades() {
    let fx = fixture().await;
    assert!(fx.dir.delete_property(fx.it.property).await.unwrap());

    assert!(matches!(fx.dir.option(fx.it.id).await, Err(Error::NotFound(_))));
    assert!(fx.dir.backend().get_property_by_slug("department").await.is_err());

    // filters on the removed slug are ignored, projection no longer lists it
    let listing = fx.dir.list(&QueryParams::parse("department=it")).await.unwrap();
    assert_eq!(listing.page_info.count, 3);
    assert!(!listing.items[0].contains_key("department"));
}

#[tokio::test]
async fn test_plain_backend_delete_is_restricted() {
    let fx = fixture().await;
    let err = fx.dir.backend().delete_contact(fx.jane.id).await.unwrap_err();
    assert!(matches!(err, Error::DependencyConflict(_)));
}
