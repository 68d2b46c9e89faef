use criterion::{Criterion, Throughput, black_box, criterion_group, criterion_main};

use weighpoint_core::{
    Direction, DriverId, Kilograms, OperatorId, ProductId, SiteId, Tonnes, VehicleId,
    WeighbridgeId,
};
use weighpoint_infra::{
    AdjustmentRequest, CreateStockpileRequest, CreateTicketRequest, FinalizeRequest,
    ServiceConfig, WeighbridgeApp, WeighingRequest, build_in_memory,
};
use weighpoint_stock::AdjustmentReason;
use weighpoint_tickets::QualityRecord;

fn bench_app() -> WeighbridgeApp {
    build_in_memory(ServiceConfig::default())
}

fn ledger_append_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("ledger_append");
    group.throughput(Throughput::Elements(1));

    group.bench_function("adjustment", |b| {
        let app = bench_app();
        let pile = app
            .service
            .create_stockpile(CreateStockpileRequest {
                site_id: SiteId::new(),
                product_id: ProductId::new(),
                capacity_tonnes: Tonnes::from_whole(i64::MAX / 2),
                low_stock_threshold_tonnes: Tonnes::from_whole(1),
                high_stock_threshold_tonnes: Tonnes::from_whole(i64::MAX / 4),
                reserved_quantity_tonnes: Tonnes::ZERO,
                opening_quantity_tonnes: Some(Tonnes::from_whole(1_000)),
                recorded_by: OperatorId::new(),
            })
            .expect("stockpile creation failed");
        let pile_id = pile.id_typed();

        b.iter(|| {
            let (movement, _) = app
                .service
                .create_adjustment(AdjustmentRequest {
                    stockpile_id: pile_id,
                    signed_quantity_tonnes: Tonnes::from_whole(1),
                    reason: AdjustmentReason::PhysicalCount,
                    notes: None,
                    recorded_by: OperatorId::new(),
                })
                .expect("adjustment failed");
            black_box(movement)
        });
    });

    group.finish();
}

fn full_weighing_cycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("weighing_cycle");
    group.throughput(Throughput::Elements(1));

    group.bench_function("open_weigh_finalize", |b| {
        let app = bench_app();
        let site_id = SiteId::new();
        let product_id = ProductId::new();
        app.service
            .create_stockpile(CreateStockpileRequest {
                site_id,
                product_id,
                capacity_tonnes: Tonnes::from_whole(i64::MAX / 2),
                low_stock_threshold_tonnes: Tonnes::from_whole(1),
                high_stock_threshold_tonnes: Tonnes::from_whole(i64::MAX / 4),
                reserved_quantity_tonnes: Tonnes::ZERO,
                opening_quantity_tonnes: Some(Tonnes::from_whole(1_000)),
                recorded_by: OperatorId::new(),
            })
            .expect("stockpile creation failed");

        b.iter(|| {
            let ticket = app
                .service
                .create_ticket(CreateTicketRequest {
                    order: None,
                    site_id,
                    vehicle_id: VehicleId::new(),
                    driver_id: DriverId::new(),
                    product_id,
                    direction: Some(Direction::Inbound),
                    price_per_tonne: None,
                    notes: None,
                })
                .expect("ticket creation failed");
            let ticket_id = ticket.id_typed();

            app.service
                .capture_tare(WeighingRequest {
                    ticket_id,
                    weight_kg: Kilograms::new(12_000),
                    weighbridge_id: WeighbridgeId::new(),
                    operator_id: OperatorId::new(),
                    photo_url: None,
                })
                .expect("tare failed");
            app.service
                .capture_gross(WeighingRequest {
                    ticket_id,
                    weight_kg: Kilograms::new(31_000),
                    weighbridge_id: WeighbridgeId::new(),
                    operator_id: OperatorId::new(),
                    photo_url: None,
                })
                .expect("gross failed");
            let settled = app
                .service
                .finalize_ticket(FinalizeRequest {
                    ticket_id,
                    quality: QualityRecord::default(),
                    finalized_by: OperatorId::new(),
                })
                .expect("finalize failed");
            black_box(settled)
        });
    });

    group.finish();
}

criterion_group!(benches, ledger_append_throughput, full_weighing_cycle);
criterion_main!(benches);
