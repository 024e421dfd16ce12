// Idempotent DDL for the companies registry and for every tenant database.
// Statements run one at a time; MySQL does not accept multi-statement strings
// over the binary protocol.

use sqlx::MySqlPool;
use tracing::info;

pub const MAIN_SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS companies (
        id BIGINT AUTO_INCREMENT PRIMARY KEY,
        name VARCHAR(255) NOT NULL,
        subdomain VARCHAR(100) NOT NULL UNIQUE,
        custom_domain VARCHAR(255) NULL UNIQUE,
        database_name VARCHAR(64) NOT NULL UNIQUE,
        email VARCHAR(255) NOT NULL,
        phone VARCHAR(50) NULL,
        address TEXT NULL,
        plan VARCHAR(20) NOT NULL DEFAULT 'trial',
        status VARCHAR(20) NOT NULL DEFAULT 'trial',
        max_users INT NOT NULL DEFAULT 5,
        max_vehicles INT NOT NULL DEFAULT 10,
        trial_ends_at DATETIME NULL,
        subscription_ends_at DATETIME NULL,
        primary_color VARCHAR(7) NOT NULL DEFAULT '#556ee6',
        settings JSON NULL,
        created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
        updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP,
        INDEX idx_companies_status (status)
    ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS tenant_users (
        id BIGINT AUTO_INCREMENT PRIMARY KEY,
        company_id BIGINT NOT NULL,
        employee_id BIGINT NOT NULL,
        username VARCHAR(100) NOT NULL,
        role VARCHAR(50) NOT NULL DEFAULT 'employee',
        is_owner BOOLEAN NOT NULL DEFAULT FALSE,
        is_active BOOLEAN NOT NULL DEFAULT TRUE,
        created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
        UNIQUE KEY uq_tenant_user (company_id, employee_id),
        FOREIGN KEY (company_id) REFERENCES companies(id) ON DELETE CASCADE
    ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4
    "#,
];

pub const TENANT_SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS roles (
        id BIGINT AUTO_INCREMENT PRIMARY KEY,
        role_key VARCHAR(50) NOT NULL UNIQUE,
        role_name VARCHAR(100) NOT NULL,
        description TEXT NULL,
        is_system_role BOOLEAN NOT NULL DEFAULT FALSE,
        created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
        updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP
    ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS permissions (
        id BIGINT AUTO_INCREMENT PRIMARY KEY,
        permission_key VARCHAR(100) NOT NULL UNIQUE,
        permission_name VARCHAR(150) NOT NULL,
        description TEXT NULL,
        module VARCHAR(50) NOT NULL,
        created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
    ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS role_permissions (
        id BIGINT AUTO_INCREMENT PRIMARY KEY,
        role_id BIGINT NOT NULL,
        permission_id BIGINT NOT NULL,
        UNIQUE KEY uq_role_permission (role_id, permission_id),
        FOREIGN KEY (role_id) REFERENCES roles(id) ON DELETE CASCADE,
        FOREIGN KEY (permission_id) REFERENCES permissions(id) ON DELETE CASCADE
    ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS employees (
        id BIGINT AUTO_INCREMENT PRIMARY KEY,
        employee_id VARCHAR(20) NOT NULL UNIQUE,
        username VARCHAR(100) NOT NULL UNIQUE,
        email VARCHAR(255) NOT NULL UNIQUE,
        password_hash VARCHAR(255) NOT NULL,
        full_name VARCHAR(255) NULL,
        department VARCHAR(100) NULL,
        position VARCHAR(100) NULL,
        role VARCHAR(50) NOT NULL DEFAULT 'employee',
        status VARCHAR(20) NOT NULL DEFAULT 'active',
        phone VARCHAR(50) NULL,
        created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
        updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP,
        INDEX idx_employees_role (role)
    ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS vehicles (
        id BIGINT AUTO_INCREMENT PRIMARY KEY,
        vehicle_number VARCHAR(50) NOT NULL UNIQUE,
        make VARCHAR(100) NOT NULL,
        model VARCHAR(100) NOT NULL,
        year INT NULL,
        color VARCHAR(50) NULL,
        vehicle_type VARCHAR(50) NULL,
        status VARCHAR(20) NOT NULL DEFAULT 'available',
        mileage BIGINT NOT NULL DEFAULT 0,
        last_service_date DATE NULL,
        notes TEXT NULL,
        added_by BIGINT NULL,
        created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
        updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP,
        INDEX idx_vehicles_status (status)
    ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS vehicle_assignments (
        id BIGINT AUTO_INCREMENT PRIMARY KEY,
        vehicle_id BIGINT NOT NULL,
        employee_id BIGINT NOT NULL,
        assigned_by BIGINT NULL,
        assignment_date DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
        return_date DATETIME NULL,
        status VARCHAR(20) NOT NULL DEFAULT 'active',
        mileage_at_assignment BIGINT NOT NULL DEFAULT 0,
        mileage_at_return BIGINT NULL,
        purpose TEXT NULL,
        notes TEXT NULL,
        INDEX idx_assignments_status (status),
        FOREIGN KEY (vehicle_id) REFERENCES vehicles(id) ON DELETE CASCADE,
        FOREIGN KEY (employee_id) REFERENCES employees(id) ON DELETE CASCADE
    ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS fuel_records (
        id BIGINT AUTO_INCREMENT PRIMARY KEY,
        vehicle_id BIGINT NOT NULL,
        employee_id BIGINT NULL,
        fuel_date DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
        fuel_amount DECIMAL(10,2) NOT NULL,
        fuel_cost DECIMAL(10,2) NOT NULL,
        odometer_reading BIGINT NULL,
        fuel_type VARCHAR(30) NULL,
        station_name VARCHAR(255) NULL,
        receipt_path VARCHAR(500) NULL,
        notes TEXT NULL,
        created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
        INDEX idx_fuel_date (fuel_date),
        FOREIGN KEY (vehicle_id) REFERENCES vehicles(id) ON DELETE CASCADE
    ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS service_requisitions (
        id BIGINT AUTO_INCREMENT PRIMARY KEY,
        requisition_number VARCHAR(20) NOT NULL UNIQUE,
        date_requested DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
        vehicle_id BIGINT NOT NULL,
        vehicle_reg_number VARCHAR(50) NULL,
        vehicle_make VARCHAR(100) NULL,
        vehicle_model VARCHAR(100) NULL,
        current_mileage BIGINT NULL,
        work_description TEXT NOT NULL,
        requested_by BIGINT NOT NULL,
        service_history TEXT NULL,
        line_manager_id BIGINT NULL,
        line_manager_status VARCHAR(20) NOT NULL DEFAULT 'pending',
        line_manager_comments TEXT NULL,
        line_manager_reviewed_at DATETIME NULL,
        director_id BIGINT NULL,
        director_status VARCHAR(20) NOT NULL DEFAULT 'pending',
        director_comments TEXT NULL,
        director_approved_at DATETIME NULL,
        overall_status VARCHAR(30) NOT NULL DEFAULT 'pending',
        notes TEXT NULL,
        created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
        updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP,
        FOREIGN KEY (vehicle_id) REFERENCES vehicles(id) ON DELETE CASCADE
    ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS job_cards (
        id BIGINT AUTO_INCREMENT PRIMARY KEY,
        job_card_number VARCHAR(20) NOT NULL UNIQUE,
        vehicle_id BIGINT NOT NULL,
        requisition_id BIGINT NULL,
        customer_name VARCHAR(255) NULL,
        customer_phone VARCHAR(50) NULL,
        customer_email VARCHAR(255) NULL,
        date_in DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
        expected_completion DATETIME NULL,
        date_out DATETIME NULL,
        odometer_in BIGINT NULL,
        odometer_out BIGINT NULL,
        fuel_level VARCHAR(20) NULL,
        reported_issues TEXT NULL,
        diagnosis TEXT NULL,
        recommended_services TEXT NULL,
        assigned_technician VARCHAR(255) NULL,
        status VARCHAR(20) NOT NULL DEFAULT 'open',
        priority VARCHAR(20) NOT NULL DEFAULT 'normal',
        total_cost DECIMAL(12,2) NOT NULL DEFAULT 0,
        labor_cost DECIMAL(12,2) NOT NULL DEFAULT 0,
        parts_cost DECIMAL(12,2) NOT NULL DEFAULT 0,
        notes TEXT NULL,
        created_by BIGINT NULL,
        created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
        updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP,
        INDEX idx_job_cards_status (status),
        FOREIGN KEY (vehicle_id) REFERENCES vehicles(id) ON DELETE CASCADE
    ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS job_card_items (
        id BIGINT AUTO_INCREMENT PRIMARY KEY,
        job_card_id BIGINT NOT NULL,
        item_type VARCHAR(10) NOT NULL,
        description VARCHAR(500) NOT NULL,
        quantity DECIMAL(10,2) NOT NULL DEFAULT 1,
        unit_price DECIMAL(12,2) NOT NULL DEFAULT 0,
        total_price DECIMAL(12,2) NOT NULL DEFAULT 0,
        status VARCHAR(20) NOT NULL DEFAULT 'pending',
        notes TEXT NULL,
        created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
        FOREIGN KEY (job_card_id) REFERENCES job_cards(id) ON DELETE CASCADE
    ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS service_maintenance (
        id BIGINT AUTO_INCREMENT PRIMARY KEY,
        vehicle_id BIGINT NOT NULL,
        service_type VARCHAR(100) NOT NULL,
        service_date DATE NOT NULL,
        service_provider VARCHAR(255) NULL,
        cost DECIMAL(12,2) NOT NULL DEFAULT 0,
        odometer_reading BIGINT NULL,
        next_service_date DATE NULL,
        next_service_mileage BIGINT NULL,
        description TEXT NULL,
        parts_replaced TEXT NULL,
        invoice_path VARCHAR(500) NULL,
        status VARCHAR(20) NOT NULL DEFAULT 'completed',
        performed_by VARCHAR(255) NULL,
        job_card_id BIGINT NULL,
        requisition_id BIGINT NULL,
        notes TEXT NULL,
        created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
        INDEX idx_service_date (service_date),
        FOREIGN KEY (vehicle_id) REFERENCES vehicles(id) ON DELETE CASCADE
    ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS scheduled_reports (
        id BIGINT AUTO_INCREMENT PRIMARY KEY,
        report_name VARCHAR(255) NOT NULL,
        report_type VARCHAR(50) NOT NULL,
        frequency VARCHAR(20) NOT NULL,
        report_format VARCHAR(10) NOT NULL DEFAULT 'excel',
        recipients TEXT NOT NULL,
        filters JSON NULL,
        is_active BOOLEAN NOT NULL DEFAULT TRUE,
        next_run_date DATETIME NULL,
        last_run_date DATETIME NULL,
        execution_count INT NOT NULL DEFAULT 0,
        created_by BIGINT NOT NULL,
        created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
        updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP
    ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS report_execution_log (
        id BIGINT AUTO_INCREMENT PRIMARY KEY,
        scheduled_report_id BIGINT NOT NULL,
        executed_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
        status VARCHAR(20) NOT NULL,
        records_count INT NOT NULL DEFAULT 0,
        recipients_count INT NOT NULL DEFAULT 0,
        execution_time_ms BIGINT NULL,
        error_message TEXT NULL,
        INDEX idx_execution_report (scheduled_report_id),
        FOREIGN KEY (scheduled_report_id) REFERENCES scheduled_reports(id) ON DELETE CASCADE
    ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS analytics_audit_log (
        id BIGINT AUTO_INCREMENT PRIMARY KEY,
        employee_id BIGINT NOT NULL,
        action_type VARCHAR(50) NOT NULL,
        resource_type VARCHAR(50) NULL,
        resource_id VARCHAR(100) NULL,
        details JSON NULL,
        ip_address VARCHAR(64) NULL,
        user_agent VARCHAR(500) NULL,
        execution_time_ms BIGINT NULL,
        created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
        INDEX idx_audit_created (created_at),
        INDEX idx_audit_action (action_type),
        INDEX idx_audit_employee (employee_id)
    ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS tenant_settings (
        id BIGINT AUTO_INCREMENT PRIMARY KEY,
        setting_key VARCHAR(100) NOT NULL UNIQUE,
        setting_value TEXT NULL,
        updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP
    ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4
    "#,
];

pub async fn apply_main_schema(pool: &MySqlPool) -> Result<(), sqlx::Error> {
    apply(pool, MAIN_SCHEMA).await?;
    info!("Main schema applied ({} tables)", MAIN_SCHEMA.len());
    Ok(())
}

pub async fn apply_tenant_schema(pool: &MySqlPool) -> Result<(), sqlx::Error> {
    apply(pool, TENANT_SCHEMA).await?;
    info!("Tenant schema applied ({} tables)", TENANT_SCHEMA.len());
    Ok(())
}

async fn apply(pool: &MySqlPool, statements: &[&str]) -> Result<(), sqlx::Error> {
    for statement in statements {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_name(statement: &str) -> &str {
        statement
            .split("CREATE TABLE IF NOT EXISTS")
            .nth(1)
            .and_then(|rest| rest.split_whitespace().next())
            .unwrap_or_default()
    }

    #[test]
    fn referenced_tables_are_created_first() {
        let mut created: Vec<&str> = Vec::new();
        for statement in TENANT_SCHEMA {
            for reference in statement.split("REFERENCES ").skip(1) {
                let target = reference.split('(').next().unwrap().trim();
                assert!(created.contains(&target), "{} referenced before creation", target);
            }
            created.push(table_name(statement));
        }
    }

    #[test]
    fn tenant_schema_has_every_domain_table() {
        let names: Vec<&str> = TENANT_SCHEMA.iter().map(|s| table_name(s)).collect();
        for table in [
            "employees",
            "vehicles",
            "vehicle_assignments",
            "fuel_records",
            "service_maintenance",
            "job_cards",
            "job_card_items",
            "service_requisitions",
            "roles",
            "permissions",
            "role_permissions",
            "scheduled_reports",
            "report_execution_log",
            "analytics_audit_log",
            "tenant_settings",
        ] {
            assert!(names.contains(&table), "missing {}", table);
        }
    }
}
