use blockscout_service_launcher::test_database::TestDbGuard;

pub async fn init_db(name: &str) -> TestDbGuard {
    TestDbGuard::new::<migration::Migrator>(name).await
}
