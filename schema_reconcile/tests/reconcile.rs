//! End-to-end reconciliation passes against in-memory databases.

use pretty_assertions::assert_eq;
use rstest::{fixture, rstest};

use schema_reconcile::config::{OrphanPolicy, ReconcileConfig, RenameTypeRule};
use schema_reconcile::reconcile::{ObjectRef, Outcome};
use schema_reconcile::test_support::{MemoryDatabase, Reply, ScriptedOperator};
use schema_reconcile::{Database, Error, ReconciliationRun, Result, RunReport};

#[fixture]
fn source() -> MemoryDatabase {
    MemoryDatabase::new("source")
        .with_table(
            "users",
            &[("id", "int"), ("nickname", "varchar(32)"), ("email", "text")],
        )
        .with_table("orders", &[("id", "int"), ("total", "decimal(10,2)")])
        .with_table("sessions", &[("id", "int"), ("token", "varchar(64)")])
}

#[fixture]
fn target() -> MemoryDatabase {
    MemoryDatabase::new("target")
        .with_table(
            "users",
            &[("id", "int"), ("nick", "varchar(16)"), ("email", "text")],
        )
        .with_table("legacy_orders", &[("id", "int"), ("total", "decimal(10,2)")])
        .with_table("tmp_old", &[("x", "int")])
}

fn interactive() -> ReconcileConfig {
    ReconcileConfig::default()
}

fn unattended(orphans: OrphanPolicy) -> ReconcileConfig {
    ReconcileConfig {
        orphans,
        ..Default::default()
    }
}

async fn run(
    source: &MemoryDatabase,
    target: &MemoryDatabase,
    operator: &mut ScriptedOperator,
    options: ReconcileConfig,
) -> Result<RunReport> {
    ReconciliationRun::new(source, target, operator, options)
        .execute()
        .await
}

/// Rename `legacy_orders` onto `orders`, skip `tmp_old`, rename `nick` onto `nickname`
fn walkthrough_script() -> Vec<Reply> {
    vec![
        Reply::pick("Rename"),
        Reply::pick("Select a table name"),
        Reply::pick("orders"),
        Reply::pick("Skip"),
        Reply::pick("Rename"),
        Reply::pick("Select a field name"),
        Reply::pick("nickname"),
    ]
}

#[rstest]
#[tokio::test]
async fn walkthrough_renames_creates_and_skips(source: MemoryDatabase, target: MemoryDatabase) {
    let mut operator = ScriptedOperator::new(walkthrough_script());

    let report = run(&source, &target, &mut operator, interactive()).await.unwrap();

    let sessions_definition = source.show_create_table("sessions").await.unwrap();
    assert_eq!(
        target.executed(),
        vec![
            "RENAME TABLE `legacy_orders` TO `orders`".to_string(),
            sessions_definition,
            "ALTER TABLE `users` CHANGE COLUMN `nick` `nickname` varchar(16)".to_string(),
        ]
    );
    assert_eq!(
        target.table_names(),
        vec!["orders", "sessions", "tmp_old", "users"]
    );
    assert_eq!(
        target.columns("users").unwrap(),
        vec![
            ("id".to_string(), "int".to_string()),
            ("nickname".to_string(), "varchar(16)".to_string()),
            ("email".to_string(), "text".to_string()),
        ]
    );

    assert_eq!(
        report.outcome_of(&ObjectRef::table("legacy_orders")),
        Some(&Outcome::Renamed { to: "orders".into() })
    );
    assert_eq!(report.outcome_of(&ObjectRef::table("tmp_old")), Some(&Outcome::Skipped));
    assert_eq!(report.outcome_of(&ObjectRef::table("sessions")), Some(&Outcome::Created));
    assert_eq!(report.outcome_of(&ObjectRef::table("orders")), None);
    assert_eq!(report.ddl_count(), 3);
    assert_eq!(operator.remaining(), 0);
}

#[rstest]
#[tokio::test]
async fn second_pass_only_offers_skipped_orphans(source: MemoryDatabase, target: MemoryDatabase) {
    let mut first = ScriptedOperator::new(walkthrough_script());
    run(&source, &target, &mut first, interactive()).await.unwrap();
    let applied = target.executed().len();

    let mut second = ScriptedOperator::new([Reply::pick("Skip")]);
    let report = run(&source, &target, &mut second, interactive()).await.unwrap();

    assert_eq!(report.ddl_count(), 0);
    assert_eq!(target.executed().len(), applied);
    assert_eq!(second.asked().len(), 1);
    assert!(second.asked()[0].0.contains("`tmp_old`"));
}

#[rstest]
#[tokio::test]
async fn candidate_menu_starts_with_back_and_lists_in_order(
    source: MemoryDatabase,
    target: MemoryDatabase,
) {
    let mut operator = ScriptedOperator::new(walkthrough_script());
    run(&source, &target, &mut operator, interactive()).await.unwrap();

    let (_, candidates) = &operator.asked()[2];
    assert_eq!(candidates, &vec!["Go back to reselect", "orders", "sessions"]);
    let (_, undecided) = &operator.asked()[0];
    assert_eq!(
        undecided,
        &vec![
            "Skip",
            "Delete the table `legacy_orders`",
            "Rename the table `legacy_orders`"
        ]
    );
}

#[rstest]
#[tokio::test]
async fn confirmed_drop_is_permanent(source: MemoryDatabase, target: MemoryDatabase) {
    let mut operator = ScriptedOperator::new([
        Reply::pick("Skip"),
        Reply::pick("Delete"),
        Reply::pick("Delete the table `tmp_old`"),
        Reply::pick("Skip"),
    ]);
    let report = run(&source, &target, &mut operator, interactive()).await.unwrap();

    assert_eq!(report.outcome_of(&ObjectRef::table("tmp_old")), Some(&Outcome::Deleted));
    assert!(target.executed().contains(&"DROP TABLE `tmp_old`".to_string()));
    assert!(target.columns("tmp_old").is_none());

    // legacy_orders was skipped, so orders is created next to it
    assert_eq!(report.outcome_of(&ObjectRef::table("orders")), Some(&Outcome::Created));

    let mut rerun = ScriptedOperator::new([Reply::pick("Skip"), Reply::pick("Skip")]);
    run(&source, &target, &mut rerun, interactive()).await.unwrap();
    assert!(rerun.asked().iter().all(|(label, _)| !label.contains("tmp_old")));
}

#[rstest]
#[tokio::test]
async fn backing_out_of_a_delete_changes_nothing(source: MemoryDatabase, target: MemoryDatabase) {
    let mut operator = ScriptedOperator::new([
        Reply::pick("Delete"),
        Reply::Cancel,
        Reply::pick("Rename"),
        Reply::pick("Go back"),
        Reply::Cancel,
        Reply::pick("Skip"),
        Reply::Cancel,
    ]);
    let report = run(&source, &target, &mut operator, interactive()).await.unwrap();

    assert!(target
        .executed()
        .iter()
        .all(|sql| sql.starts_with("CREATE TABLE")));
    assert_eq!(
        report.outcome_of(&ObjectRef::table("legacy_orders")),
        Some(&Outcome::Skipped)
    );
    assert_eq!(report.outcome_of(&ObjectRef::table("tmp_old")), Some(&Outcome::Skipped));
    assert_eq!(
        report.outcome_of(&ObjectRef::column("users", "nick")),
        Some(&Outcome::Skipped)
    );
}

#[rstest]
#[tokio::test]
async fn typed_table_name_that_matches_a_candidate_consumes_it(
    source: MemoryDatabase,
    target: MemoryDatabase,
) {
    let mut operator = ScriptedOperator::new([
        Reply::pick("Rename"),
        Reply::pick("Input a new table name"),
        Reply::text("  orders "),
        Reply::pick("Skip"),
        Reply::pick("Skip"),
    ]);
    let report = run(&source, &target, &mut operator, interactive()).await.unwrap();

    assert_eq!(
        report.outcome_of(&ObjectRef::table("legacy_orders")),
        Some(&Outcome::Renamed { to: "orders".into() })
    );
    assert!(!target
        .executed()
        .iter()
        .any(|sql| sql.starts_with("CREATE TABLE `orders`")));
}

#[rstest]
#[tokio::test]
async fn typed_column_name_leaves_candidates_alone(source: MemoryDatabase, target: MemoryDatabase) {
    let mut operator = ScriptedOperator::new([
        Reply::pick("Skip"),
        Reply::pick("Skip"),
        Reply::pick("Rename"),
        Reply::pick("Input a new field name"),
        Reply::text("handle"),
    ]);
    run(&source, &target, &mut operator, interactive()).await.unwrap();

    assert!(target
        .executed()
        .contains(&"ALTER TABLE `users` CHANGE COLUMN `nick` `handle` varchar(16)".to_string()));
}

#[rstest]
#[tokio::test]
async fn source_type_rule_adopts_the_source_column_type(
    source: MemoryDatabase,
    target: MemoryDatabase,
) {
    let options = ReconcileConfig {
        rename_column_type: RenameTypeRule::Source,
        ..Default::default()
    };
    let mut operator = ScriptedOperator::new(walkthrough_script());
    run(&source, &target, &mut operator, options).await.unwrap();

    assert!(target
        .executed()
        .contains(&"ALTER TABLE `users` CHANGE COLUMN `nick` `nickname` varchar(32)".to_string()));
}

#[rstest]
#[tokio::test]
async fn dry_run_reports_without_touching_the_target(
    source: MemoryDatabase,
    target: MemoryDatabase,
) {
    let options = ReconcileConfig {
        dry_run: true,
        ..Default::default()
    };
    let before = target.table_names();
    let mut operator = ScriptedOperator::new(walkthrough_script());

    let report = run(&source, &target, &mut operator, options).await.unwrap();

    assert!(target.executed().is_empty());
    assert_eq!(target.table_names(), before);
    assert!(report.dry_run);
    assert_eq!(
        report.statements,
        vec![
            "RENAME TABLE `legacy_orders` TO `orders`".to_string(),
            source.show_create_table("sessions").await.unwrap(),
            "ALTER TABLE `users` CHANGE COLUMN `nick` `nickname` varchar(16)".to_string(),
        ]
    );
}

#[rstest]
#[tokio::test]
async fn failed_rename_returns_to_the_rename_menu(source: MemoryDatabase, target: MemoryDatabase) {
    let target = target.fail_once("RENAME TABLE `legacy_orders`");
    let mut operator = ScriptedOperator::new([
        Reply::pick("Rename"),
        Reply::pick("Select a table name"),
        Reply::pick("orders"),
        // the failed rename lands back here
        Reply::pick("Select a table name"),
        Reply::pick("orders"),
        Reply::pick("Skip"),
        Reply::pick("Skip"),
    ]);

    let report = run(&source, &target, &mut operator, interactive()).await.unwrap();

    assert_eq!(
        report.outcome_of(&ObjectRef::table("legacy_orders")),
        Some(&Outcome::Renamed { to: "orders".into() })
    );
    let (retry_label, _) = &operator.asked()[3];
    assert!(retry_label.contains("How should the table `legacy_orders` be renamed?"));
    assert!(retry_label.contains("The last statement failed"));
    assert!(retry_label.contains("RENAME TABLE `legacy_orders` TO `orders`"));
    assert_eq!(operator.remaining(), 0);
}

#[rstest]
#[tokio::test]
async fn failed_drop_can_be_skipped_afterwards(source: MemoryDatabase, target: MemoryDatabase) {
    let target = target.fail_on("DROP TABLE `tmp_old`");
    let mut operator = ScriptedOperator::new([
        Reply::pick("Skip"),
        Reply::pick("Delete"),
        Reply::pick("Delete the table"),
        Reply::pick("Skip"),
        Reply::pick("Skip"),
    ]);

    let report = run(&source, &target, &mut operator, interactive()).await.unwrap();

    assert_eq!(report.outcome_of(&ObjectRef::table("tmp_old")), Some(&Outcome::Skipped));
    assert!(target.columns("tmp_old").is_some());
}

#[rstest]
#[tokio::test]
async fn unattended_delete_drops_every_orphan(source: MemoryDatabase, target: MemoryDatabase) {
    let mut operator = ScriptedOperator::default();

    let report = run(&source, &target, &mut operator, unattended(OrphanPolicy::Delete))
        .await
        .unwrap();

    assert!(operator.asked().is_empty());
    let executed = target.executed();
    assert_eq!(executed[0], "DROP TABLE `legacy_orders`");
    assert_eq!(executed[1], "DROP TABLE `tmp_old`");
    assert!(executed.contains(&"ALTER TABLE `users` DROP COLUMN `nick`".to_string()));
    assert_eq!(
        target.table_names(),
        vec!["orders", "sessions", "users"]
    );
    assert_eq!(report.summary().deleted, 3);
    assert_eq!(report.summary().created, 2);
}

#[rstest]
#[tokio::test]
async fn unattended_failure_is_abandoned_not_retried(source: MemoryDatabase, target: MemoryDatabase) {
    let target = target.fail_on("DROP TABLE `tmp_old`");
    let mut operator = ScriptedOperator::default();

    let report = run(&source, &target, &mut operator, unattended(OrphanPolicy::Delete))
        .await
        .unwrap();

    assert!(matches!(
        report.outcome_of(&ObjectRef::table("tmp_old")),
        Some(Outcome::Failed { reason }) if reason.contains("tmp_old")
    ));
    assert_eq!(
        report.outcome_of(&ObjectRef::table("legacy_orders")),
        Some(&Outcome::Deleted)
    );
    assert!(report.has_failures());
}

#[rstest]
#[tokio::test]
async fn unattended_skip_changes_only_missing_tables(source: MemoryDatabase, target: MemoryDatabase) {
    let mut operator = ScriptedOperator::default();

    let report = run(&source, &target, &mut operator, unattended(OrphanPolicy::Skip))
        .await
        .unwrap();

    assert!(target
        .executed()
        .iter()
        .all(|sql| sql.starts_with("CREATE TABLE")));
    assert_eq!(report.summary().created, 2);
    assert_eq!(report.summary().skipped, 3);
}

#[rstest]
#[tokio::test]
async fn describe_failure_only_affects_that_table(source: MemoryDatabase) {
    let source = source.with_table("accounts", &[("id", "int")]);
    let target = MemoryDatabase::new("target")
        .with_table("users", &[("id", "int")])
        .with_table("accounts", &[("id", "int"), ("legacy_flag", "tinyint(1)")])
        .with_table("orders", &[("id", "int"), ("total", "decimal(10,2)")])
        .with_table("sessions", &[("id", "int"), ("token", "varchar(64)")])
        .fail_describe("users");
    let mut operator = ScriptedOperator::default();

    let report = run(&source, &target, &mut operator, unattended(OrphanPolicy::Delete))
        .await
        .unwrap();

    assert!(matches!(
        report.outcome_of(&ObjectRef::table("users")),
        Some(Outcome::Failed { .. })
    ));
    assert_eq!(
        report.outcome_of(&ObjectRef::column("accounts", "legacy_flag")),
        Some(&Outcome::Deleted)
    );
}

#[rstest]
#[tokio::test]
async fn column_rename_consumes_only_its_candidate() {
    let source = MemoryDatabase::new("source").with_table(
        "users",
        &[("id", "int"), ("nickname", "varchar(32)"), ("phone", "varchar(20)")],
    );
    let target = MemoryDatabase::new("target").with_table(
        "users",
        &[("id", "int"), ("nick", "varchar(16)"), ("tel", "varchar(20)")],
    );
    let mut operator = ScriptedOperator::new([
        Reply::pick("Rename"),
        Reply::pick("Select a field name"),
        Reply::pick("nickname"),
        Reply::pick("Rename"),
        Reply::pick("Select a field name"),
        Reply::pick("phone"),
    ]);

    run(&source, &target, &mut operator, interactive()).await.unwrap();

    let (_, first_candidates) = &operator.asked()[2];
    assert_eq!(first_candidates, &vec!["Go back to reselect", "nickname", "phone"]);
    let (_, second_candidates) = &operator.asked()[5];
    assert_eq!(second_candidates, &vec!["Go back to reselect", "phone"]);
    assert_eq!(
        target.executed(),
        vec![
            "ALTER TABLE `users` CHANGE COLUMN `nick` `nickname` varchar(16)".to_string(),
            "ALTER TABLE `users` CHANGE COLUMN `tel` `phone` varchar(20)".to_string(),
        ]
    );
}

#[rstest]
#[tokio::test]
async fn table_described_without_columns_is_left_alone() {
    let source = MemoryDatabase::new("source").with_table("users", &[]);
    let target = MemoryDatabase::new("target").with_table("users", &[("id", "int"), ("email", "text")]);
    let mut operator = ScriptedOperator::default();

    let report = run(&source, &target, &mut operator, unattended(OrphanPolicy::Delete))
        .await
        .unwrap();

    assert!(target.executed().is_empty());
    assert!(matches!(
        report.outcome_of(&ObjectRef::table("users")),
        Some(Outcome::Failed { reason }) if reason.contains("reported no columns")
    ));
    assert_eq!(report.outcome_of(&ObjectRef::column("users", "id")), None);
}

#[rstest]
#[tokio::test]
async fn listing_failure_aborts_the_run(source: MemoryDatabase, target: MemoryDatabase) {
    let target = target.fail_listing();
    let mut operator = ScriptedOperator::default();

    let err = run(&source, &target, &mut operator, interactive()).await.unwrap_err();

    assert!(matches!(err, Error::IntrospectionError(_)));
    assert!(target.executed().is_empty());
}

#[rstest]
#[tokio::test]
async fn aligned_schemas_need_no_operator() {
    let source = MemoryDatabase::new("source").with_table("users", &[("id", "int")]);
    let target = MemoryDatabase::new("target").with_table("users", &[("id", "bigint")]);
    let mut operator = ScriptedOperator::default();

    let report = run(&source, &target, &mut operator, interactive()).await.unwrap();

    assert!(report.outcomes.is_empty());
    assert!(target.executed().is_empty());
}
