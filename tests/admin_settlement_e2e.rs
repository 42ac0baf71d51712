//! Admin Settlement End-to-End Tests
//!
//! Back-office state transitions under contention: deposit and
//! withdrawal decisions, order settlement, and loan approvals. Every
//! transition is a conditional write, so racing administrators must
//! produce exactly one applied change.

use astex::persistence::loans::LoanRepository;
use astex::persistence::models::{
    CreateLoanRequest, CreateOrder, CreateTransaction, CreateUser, Transition, UserRecord,
};
use astex::persistence::orders::OrderRepository;
use astex::persistence::transactions::TransactionRepository;
use astex::persistence::users::UserRepository;
use astex::persistence::{init_database, DatabaseError, DbPool};
use chrono::Utc;
use uuid::Uuid;

async fn setup() -> DbPool {
    init_database("sqlite::memory:").await.unwrap()
}

async fn seed_customer(pool: &DbPool) -> UserRecord {
    let tag = Uuid::new_v4().simple().to_string();
    UserRepository::new(pool.clone())
        .create(CreateUser {
            email: format!("customer-{}@example.com", tag),
            phone: format!("9{}", &tag[..9]),
            password_hash: "unused-hash".to_string(),
            name: "Test Customer".to_string(),
            role: "customer".to_string(),
            address: None,
            bank_name: None,
            account_number: None,
            account_holder: None,
            ifsc_code: None,
        })
        .await
        .unwrap()
}

fn withdrawal(user_id: &str, amount: f64) -> CreateTransaction {
    CreateTransaction {
        user_id: user_id.to_string(),
        reference: format!("WD{}", Uuid::new_v4().simple()),
        kind: "WITHDRAW".to_string(),
        amount,
        description: None,
    }
}

fn order(user_id: &str, kind: &str, quantity: f64, buy_price: f64) -> CreateOrder {
    CreateOrder {
        user_id: user_id.to_string(),
        symbol: "GBPUSD".to_string(),
        quantity,
        buy_price,
        kind: kind.to_string(),
        trade_date: Utc::now(),
    }
}

#[tokio::test]
async fn test_settlement_computes_profit_from_stored_prices() {
    let pool = setup().await;
    let user = seed_customer(&pool).await;
    let orders = OrderRepository::new(pool.clone());

    let long = orders.create(order(&user.id, "LONG", 10.0, 100.0)).await.unwrap();
    match orders.request_sell(&long.id, &user.id, 120.0).await.unwrap() {
        Transition::Applied(record) => assert_eq!(record.status, "PENDING_SELL"),
        _ => panic!("sell request should apply to an open order"),
    }

    match orders.settle(&long.id).await.unwrap() {
        Transition::Applied(record) => {
            assert_eq!(record.status, "CLOSED");
            assert_eq!(record.profit_loss, Some(200.0));
        }
        _ => panic!("settlement should apply to a pending-sell order"),
    }

    // Shorts invert: bought back cheaper means profit.
    let short = orders.create(order(&user.id, "SHORT", 4.0, 150.0)).await.unwrap();
    match orders.request_sell(&short.id, &user.id, 140.0).await.unwrap() {
        Transition::Applied(_) => {}
        _ => panic!("sell request should apply"),
    }
    match orders.settle(&short.id).await.unwrap() {
        Transition::Applied(record) => assert_eq!(record.profit_loss, Some(40.0)),
        _ => panic!("settlement should apply"),
    }
}

#[tokio::test]
async fn test_settle_requires_a_sell_request() {
    let pool = setup().await;
    let user = seed_customer(&pool).await;
    let orders = OrderRepository::new(pool.clone());

    let open = orders.create(order(&user.id, "LONG", 1.0, 50.0)).await.unwrap();

    match orders.settle(&open.id).await.unwrap() {
        Transition::WrongState { current } => assert!(current.contains("OPEN")),
        _ => panic!("settling an open order must be refused"),
    }
}

#[tokio::test]
async fn test_settle_twice_leaves_first_result_untouched() {
    let pool = setup().await;
    let user = seed_customer(&pool).await;
    let orders = OrderRepository::new(pool.clone());

    let o = orders.create(order(&user.id, "LONG", 2.0, 10.0)).await.unwrap();
    match orders.request_sell(&o.id, &user.id, 15.0).await.unwrap() {
        Transition::Applied(_) => {}
        _ => panic!("sell request should apply"),
    }
    match orders.settle(&o.id).await.unwrap() {
        Transition::Applied(record) => assert_eq!(record.profit_loss, Some(10.0)),
        _ => panic!("first settlement should apply"),
    }

    match orders.settle(&o.id).await.unwrap() {
        Transition::WrongState { current } => assert!(current.contains("CLOSED")),
        _ => panic!("second settlement must be refused"),
    }

    let record = orders.get(&o.id).await.unwrap().unwrap();
    assert_eq!(record.profit_loss, Some(10.0));
}

#[tokio::test]
async fn test_concurrent_withdrawal_approval_has_one_winner() {
    let pool = setup().await;
    let user = seed_customer(&pool).await;
    let transactions = TransactionRepository::new(pool.clone());

    let wd = transactions.create(withdrawal(&user.id, 500.0)).await.unwrap();

    let left = TransactionRepository::new(pool.clone());
    let right = TransactionRepository::new(pool.clone());
    let id_a = wd.id.clone();
    let id_b = wd.id.clone();

    let (a, b) = tokio::join!(
        tokio::spawn(async move { left.decide_withdrawal(&id_a, true).await.unwrap() }),
        tokio::spawn(async move { right.decide_withdrawal(&id_b, false).await.unwrap() }),
    );

    let outcomes = [a.unwrap(), b.unwrap()];
    let applied = outcomes
        .iter()
        .filter(|t| matches!(t, Transition::Applied(_)))
        .count();
    let refused = outcomes
        .iter()
        .filter(|t| matches!(t, Transition::WrongState { .. }))
        .count();

    assert_eq!(applied, 1);
    assert_eq!(refused, 1);

    // The stored row reflects exactly one decision.
    let record = transactions.get(&wd.id).await.unwrap().unwrap();
    assert!(record.status == "COMPLETED" || record.status == "FAILED");
}

#[tokio::test]
async fn test_verified_deposit_is_immutable() {
    let pool = setup().await;
    let user = seed_customer(&pool).await;
    let transactions = TransactionRepository::new(pool.clone());

    let dep = transactions
        .create(CreateTransaction {
            user_id: user.id.clone(),
            reference: format!("DEP{}", Uuid::new_v4().simple()),
            kind: "DEPOSIT".to_string(),
            amount: 100.0,
            description: None,
        })
        .await
        .unwrap();

    match transactions.verify_deposit(&dep.id, true).await.unwrap() {
        Transition::Applied(record) => {
            assert_eq!(record.status, "COMPLETED");
            assert!(record.verified);
        }
        _ => panic!("verification should apply to a pending deposit"),
    }

    // A later rejection attempt must not unwind the verification.
    match transactions.verify_deposit(&dep.id, false).await.unwrap() {
        Transition::WrongState { current } => assert!(current.contains("COMPLETED")),
        _ => panic!("terminal deposits must be immutable"),
    }

    let record = transactions.get(&dep.id).await.unwrap().unwrap();
    assert_eq!(record.status, "COMPLETED");
    assert!(record.verified);
}

#[tokio::test]
async fn test_withdrawal_decision_rejects_deposit_ids() {
    let pool = setup().await;
    let user = seed_customer(&pool).await;
    let transactions = TransactionRepository::new(pool.clone());

    let dep = transactions
        .create(CreateTransaction {
            user_id: user.id.clone(),
            reference: format!("DEP{}", Uuid::new_v4().simple()),
            kind: "DEPOSIT".to_string(),
            amount: 100.0,
            description: None,
        })
        .await
        .unwrap();

    match transactions.decide_withdrawal(&dep.id, true).await.unwrap() {
        Transition::WrongState { .. } => {}
        _ => panic!("a deposit must not pass through the withdrawal flow"),
    }
}

#[tokio::test]
async fn test_loan_lifecycle_and_single_active_request() {
    let pool = setup().await;
    let user = seed_customer(&pool).await;
    let loans = LoanRepository::new(pool.clone());

    let first = loans
        .create(CreateLoanRequest {
            user_id: user.id.clone(),
            amount: 1000.0,
            duration_months: 12,
        })
        .await
        .unwrap();

    // A second request while one is pending hits the unique index.
    let second = loans
        .create(CreateLoanRequest {
            user_id: user.id.clone(),
            amount: 2000.0,
            duration_months: 6,
        })
        .await;
    assert!(matches!(second, Err(DatabaseError::ConstraintViolation(_))));

    match loans.decide(&first.id, true).await.unwrap() {
        Transition::Applied(record) => {
            assert_eq!(record.status, "APPROVED");
            assert!(record.decided_at.is_some());
        }
        _ => panic!("decision should apply to a pending loan"),
    }

    // Decided loans stay decided.
    match loans.decide(&first.id, false).await.unwrap() {
        Transition::WrongState { current } => assert!(current.contains("APPROVED")),
        _ => panic!("a decided loan must be immutable"),
    }

    // An approved loan still blocks new requests; only rejection frees them.
    let third = loans
        .create(CreateLoanRequest {
            user_id: user.id.clone(),
            amount: 500.0,
            duration_months: 3,
        })
        .await;
    assert!(matches!(third, Err(DatabaseError::ConstraintViolation(_))));
}

#[tokio::test]
async fn test_rejected_loan_frees_a_new_request() {
    let pool = setup().await;
    let user = seed_customer(&pool).await;
    let loans = LoanRepository::new(pool.clone());

    let first = loans
        .create(CreateLoanRequest {
            user_id: user.id.clone(),
            amount: 1000.0,
            duration_months: 12,
        })
        .await
        .unwrap();
    match loans.decide(&first.id, false).await.unwrap() {
        Transition::Applied(record) => assert_eq!(record.status, "REJECTED"),
        _ => panic!("rejection should apply"),
    }

    let second = loans
        .create(CreateLoanRequest {
            user_id: user.id.clone(),
            amount: 800.0,
            duration_months: 12,
        })
        .await
        .unwrap();
    assert_eq!(second.status, "PENDING");
}
