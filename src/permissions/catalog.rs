// Default permission keys and system roles seeded into every tenant database.

/// (key, display name, description, module)
pub type PermissionDef = (&'static str, &'static str, &'static str, &'static str);

pub const DEFAULT_PERMISSIONS: &[PermissionDef] = &[
    // Vehicles
    ("view_vehicles", "View Vehicles", "Can view vehicle list and details", "Vehicles"),
    ("add_vehicle", "Add Vehicle", "Can add new vehicles", "Vehicles"),
    ("edit_vehicle", "Edit Vehicle", "Can edit vehicle details", "Vehicles"),
    ("delete_vehicle", "Delete Vehicle", "Can delete vehicles", "Vehicles"),
    // Assignments
    ("view_assignments", "View Assignments", "Can view vehicle assignments", "Assignments"),
    ("create_assignment", "Create Assignment", "Can assign vehicles to employees", "Assignments"),
    ("edit_assignment", "Edit Assignment", "Can edit assignments", "Assignments"),
    ("return_vehicle", "Return Vehicle", "Can process vehicle returns", "Assignments"),
    ("view_own_assignments", "View Own Assignments", "Can view own vehicle assignments", "Assignments"),
    // Fuel
    ("view_all_fuel_records", "View All Fuel Records", "Can view all fuel records", "Fuel"),
    ("add_fuel_record", "Add Fuel Record", "Can add fuel records", "Fuel"),
    ("edit_fuel_record", "Edit Fuel Record", "Can edit fuel records", "Fuel"),
    ("delete_fuel_record", "Delete Fuel Record", "Can delete fuel records", "Fuel"),
    ("view_own_fuel_records", "View Own Fuel Records", "Can view own fuel records", "Fuel"),
    // Service
    ("view_service_records", "View Service Records", "Can view service records", "Service"),
    ("add_service_record", "Add Service Record", "Can add service records", "Service"),
    ("edit_service_record", "Edit Service Record", "Can edit service records", "Service"),
    ("delete_service_record", "Delete Service Record", "Can delete service records", "Service"),
    ("view_service_notifications", "View Service Notifications", "Can view service notifications", "Service"),
    // Job cards
    ("view_job_cards", "View Job Cards", "Can view job cards", "Job Cards"),
    ("create_job_card", "Create Job Card", "Can create job cards", "Job Cards"),
    ("edit_job_card", "Edit Job Card", "Can edit job cards", "Job Cards"),
    ("delete_job_card", "Delete Job Card", "Can delete job cards", "Job Cards"),
    // Requisitions
    ("view_requisitions", "View Requisitions", "Can view service requisitions", "Requisitions"),
    ("create_requisition", "Create Requisition", "Can create service requisitions", "Requisitions"),
    ("review_requisition", "Review Requisition", "Can review requisitions (Line Manager)", "Requisitions"),
    ("approve_requisition", "Approve Requisition", "Can approve requisitions (Director)", "Requisitions"),
    // Employees
    ("view_employees", "View Employees", "Can view employee list", "Employees"),
    ("add_employee", "Add Employee", "Can add new employees", "Employees"),
    ("edit_employee", "Edit Employee", "Can edit employee details", "Employees"),
    ("delete_employee", "Delete Employee", "Can delete employees", "Employees"),
    ("manage_roles", "Manage Roles", "Can manage roles and permissions", "Employees"),
    // Settings
    ("view_settings", "View Settings", "Can view system settings", "Settings"),
    ("edit_settings", "Edit Settings", "Can edit system settings", "Settings"),
    // Reports
    ("view_reports", "View Reports", "Can view reports and analytics", "Reports"),
    ("export_reports", "Export Reports", "Can export reports", "Reports"),
    // Analytics
    ("view_dashboard", "View Dashboard", "Can view the analytics dashboard", "Analytics"),
    ("view_all_reports", "View All Reports", "Can view report data for every employee", "Analytics"),
    ("view_team_reports", "View Team Reports", "Can view report data for the team", "Analytics"),
    ("view_own_reports", "View Own Reports", "Can view own report data", "Analytics"),
    ("view_kpis", "View KPIs", "Can view fleet KPIs", "Analytics"),
    ("export_excel", "Export Excel", "Can export reports to Excel", "Analytics"),
    ("export_pdf", "Export PDF", "Can export reports to PDF", "Analytics"),
    ("create_scheduled_reports", "Create Scheduled Reports", "Can create scheduled reports", "Analytics"),
    ("delete_scheduled_reports", "Delete Scheduled Reports", "Can delete scheduled reports", "Analytics"),
    ("view_audit_trail", "View Audit Trail", "Can view the analytics audit trail", "Analytics"),
    ("manage_permissions", "Manage Permissions", "Can manage analytics permissions", "Analytics"),
];

pub struct RoleDef {
    pub key: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    /// `None` grants every permission in the catalog.
    pub permissions: Option<&'static [&'static str]>,
}

pub const DEFAULT_ROLES: &[RoleDef] = &[
    RoleDef {
        key: "employee",
        name: "Employee",
        description: "Basic employee with limited access",
        permissions: Some(&[
            "view_vehicles",
            "view_own_assignments",
            "view_own_fuel_records",
            "add_fuel_record",
            "create_requisition",
            "view_requisitions",
            "view_dashboard",
            "view_own_reports",
            "export_excel",
        ]),
    },
    RoleDef {
        key: "manager",
        name: "Manager",
        description: "Line manager who can review requisitions",
        permissions: Some(&[
            "view_vehicles",
            "view_assignments",
            "create_assignment",
            "return_vehicle",
            "view_all_fuel_records",
            "add_fuel_record",
            "view_service_records",
            "view_service_notifications",
            "view_job_cards",
            "view_requisitions",
            "create_requisition",
            "review_requisition",
            "view_reports",
            "view_dashboard",
            "view_team_reports",
            "view_kpis",
            "export_excel",
            "create_scheduled_reports",
        ]),
    },
    RoleDef {
        key: "director",
        name: "Director",
        description: "Director who can approve requisitions and access most features",
        permissions: Some(&[
            "view_vehicles",
            "add_vehicle",
            "edit_vehicle",
            "view_assignments",
            "create_assignment",
            "edit_assignment",
            "return_vehicle",
            "view_all_fuel_records",
            "add_fuel_record",
            "view_service_records",
            "add_service_record",
            "view_service_notifications",
            "view_job_cards",
            "create_job_card",
            "view_requisitions",
            "create_requisition",
            "review_requisition",
            "approve_requisition",
            "view_reports",
            "export_reports",
            "view_settings",
            "view_dashboard",
            "view_all_reports",
            "view_kpis",
            "export_excel",
            "export_pdf",
            "create_scheduled_reports",
            "view_audit_trail",
        ]),
    },
    RoleDef {
        key: "admin",
        name: "Administrator",
        description: "Full system access with all permissions",
        permissions: None,
    },
];

pub fn is_known_permission(key: &str) -> bool {
    DEFAULT_PERMISSIONS.iter().any(|(k, ..)| *k == key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn permission_keys_are_unique() {
        let keys: HashSet<_> = DEFAULT_PERMISSIONS.iter().map(|(k, ..)| *k).collect();
        assert_eq!(keys.len(), DEFAULT_PERMISSIONS.len());
    }

    #[test]
    fn role_grants_reference_catalog_keys() {
        for role in DEFAULT_ROLES {
            for key in role.permissions.unwrap_or_default() {
                assert!(is_known_permission(key), "{} grants unknown {}", role.key, key);
            }
        }
    }

    #[test]
    fn only_admin_gets_everything() {
        let all: Vec<_> = DEFAULT_ROLES.iter().filter(|r| r.permissions.is_none()).collect();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].key, "admin");
    }
}
