// These tests need a PostgreSQL database reachable through DATABASE_URL.
// Every test runs inside a transaction that is rolled back at the end.

use super::PgService;
use crate::AggregateQuery;
use crate::ServiceError;
use crate::Subscription;
use chrono::NaiveDate;
use diesel::connection::Connection;
use diesel::result::Error;
use serial_test::serial;

fn month(month: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, month, 1).unwrap()
}

fn subscription(user_id: &str, service_name: &str, price: i32) -> Subscription {
    Subscription::builder()
        .service_name(service_name)
        .price(price)
        .user_id(user_id)
        .start_date(month(2))
        .end_date(month(6))
        .build()
}

#[test]
#[ignore]
#[serial]
fn create_returns_generated_id() {
    let service = PgService::test();
    let mut connection = service.get_connection().unwrap();

    connection.test_transaction::<(), Error, _>(|conn| {
        let first = PgService::create_query(conn, &subscription("u1", "Netflix", 400)).unwrap();
        let second = PgService::create_query(conn, &subscription("u1", "Netflix", 400)).unwrap();

        let first: i32 = first.parse().unwrap();
        let second: i32 = second.parse().unwrap();

        assert!(second > first);

        let stored = PgService::read_one_query(conn, first).unwrap();

        assert_eq!(first, stored.id);
        assert_eq!("Netflix", stored.service_name);
        assert_eq!(Some(month(2)), stored.start_date);
        assert_eq!(None, stored.total_sum);

        Ok(())
    });
}

#[test]
#[ignore]
#[serial]
fn create_rejects_invalid_record() {
    let service = PgService::test();
    let mut connection = service.get_connection().unwrap();

    connection.test_transaction::<(), Error, _>(|conn| {
        let result = PgService::create_query(conn, &subscription("u1", "", 400));

        assert!(matches!(result, Err(ServiceError::InvalidRecord(_))));

        Ok(())
    });
}

#[test]
#[ignore]
#[serial]
fn read_one_of_missing_id_is_not_found() {
    let service = PgService::test();
    let mut connection = service.get_connection().unwrap();

    connection.test_transaction::<(), Error, _>(|conn| {
        let result = PgService::read_one_query(conn, -1);

        assert!(matches!(result, Err(ServiceError::NotFound(-1))));

        Ok(())
    });
}

#[test]
#[ignore]
#[serial]
fn read_many_only_returns_records_of_the_user() {
    let service = PgService::test();
    let mut connection = service.get_connection().unwrap();

    connection.test_transaction::<(), Error, _>(|conn| {
        PgService::create_query(conn, &subscription("pg-u1", "Netflix", 400)).unwrap();
        PgService::create_query(conn, &subscription("pg-u1", "Spotify", 200)).unwrap();
        PgService::create_query(conn, &subscription("pg-u2", "Netflix", 400)).unwrap();

        let records = PgService::read_many_query(conn, "pg-u1").unwrap();

        assert_eq!(2, records.len());
        assert!(records.iter().all(|record| record.user_id == "pg-u1"));
        assert!(PgService::read_many_query(conn, "pg-nobody").unwrap().is_empty());

        Ok(())
    });
}

#[test]
#[ignore]
#[serial]
fn update_and_delete_report_missing_rows() {
    let service = PgService::test();
    let mut connection = service.get_connection().unwrap();

    connection.test_transaction::<(), Error, _>(|conn| {
        let id: i32 = PgService::create_query(conn, &subscription("pg-u1", "Netflix", 400))
            .unwrap()
            .parse()
            .unwrap();

        let mut record = PgService::read_one_query(conn, id).unwrap();
        record.price = 450;
        record.end_date = None;

        PgService::update_query(conn, &record).unwrap();

        let updated = PgService::read_one_query(conn, id).unwrap();

        assert_eq!(450, updated.price);
        assert_eq!(None, updated.end_date);

        PgService::delete_query(conn, id).unwrap();

        assert!(matches!(
            PgService::delete_query(conn, id),
            Err(ServiceError::NotFound(_))
        ));
        assert!(matches!(
            PgService::update_query(conn, &record),
            Err(ServiceError::NotFound(_))
        ));

        Ok(())
    });
}

#[test]
#[ignore]
#[serial]
fn aggregate_sums_prices_inside_the_period() {
    let service = PgService::test();
    let mut connection = service.get_connection().unwrap();

    connection.test_transaction::<(), Error, _>(|conn| {
        PgService::create_query(conn, &subscription("pg-u1", "Netflix", 400)).unwrap();
        PgService::create_query(conn, &subscription("pg-u1", "Netflix", 350)).unwrap();
        PgService::create_query(conn, &subscription("pg-u1", "Spotify", 200)).unwrap();

        let mut late = subscription("pg-u1", "Netflix", 1000);
        late.end_date = Some(month(11));
        PgService::create_query(conn, &late).unwrap();

        let query = AggregateQuery::builder()
            .service_name("Netflix")
            .user_id("pg-u1")
            .period_start(month(1))
            .period_end(month(6))
            .build();

        let records = PgService::aggregate_query(conn, &query).unwrap();

        assert_eq!(3, records.len());
        assert_eq!(&Subscription::total(750), records.last().unwrap());

        let query = AggregateQuery::builder()
            .service_name("Hulu")
            .user_id("pg-u1")
            .period_start(month(1))
            .period_end(month(6))
            .build();

        let records = PgService::aggregate_query(conn, &query).unwrap();

        assert_eq!(vec![Subscription::total(0)], records);

        Ok(())
    });
}
